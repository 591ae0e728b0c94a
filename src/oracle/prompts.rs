use super::{AnswerJudgeRequest, QuestionGenerationRequest, QuestionJudgeRequest};

pub const JUDGE_SYSTEM: &str = "You are the game master of a guessing game. \
    You judge strictly from the reference information and reply with a single JSON object and nothing else.";

pub const KEYWORDS_SYSTEM: &str = "You write search engine queries. \
    Output only space separated keywords, no explanation.";

pub const PLAYER_SYSTEM: &str = "You are a participant in a guessing game. \
    Output only the question itself, on one line.";

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none yet)".to_string();
    }
    items
        .iter()
        .map(|q| format!("* {}", q))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn judge_question(request: &QuestionJudgeRequest<'_>) -> String {
    format!(
        r#"Answer the player's question about the target using the reference information.

## Theme
{theme}

## Target
{topic}

## Reference information
{background}

## Questions already asked
{existing}

## Player's question
{question}

## Rules
* Reply `yes` if the reference information clearly confirms the question.
* Reply `no` if it clearly contradicts the question, or if it contains nothing that answers it.
* First decide whether the target is a fictional character; if it is, answer about the character.
* Reply `unanswerable` if the question is open-ended and cannot be answered with yes or no.

## Output format
{{
    "reason": "why you reached the result",
    "result": "one of `yes`, `no`, `unanswerable`"
}}"#,
        theme = request.theme,
        topic = request.topic,
        background = request.background,
        existing = bullet_list(request.existing_questions),
        question = request.question,
    )
}

pub fn judge_answer(request: &AnswerJudgeRequest<'_>) -> String {
    format!(
        r#"Decide whether the player's answer names the same thing as the hidden topic.

## Theme
{theme}

## Topic
{topic}

## Player's answer
{answer}

## Reference information about the topic
{background}

## Keywords linking the answer and the topic
{keywords}

## Rules
1. If the answer and the topic match exactly, output `correct`.
2. If they differ only in spelling or notation and clearly denote the same thing, output `correct`.
3. If the answer is part of the topic and is sufficient to identify it, output `correct`.
4. If the topic is part of the answer, or the answer is necessary but not sufficient, output `more_specific`.
5. Otherwise output `incorrect`.

## Output format
{{
    "reason": "why you reached the result",
    "result": "one of `correct`, `more_specific`, `incorrect`"
}}"#,
        theme = request.theme,
        topic = request.topic,
        answer = request.answer,
        background = request.background,
        keywords = request.keywords,
    )
}

pub fn relation_keywords(theme: &str, topic: &str, input: &str) -> String {
    format!(
        r#"Write search keywords for finding out how the two items below relate.

## Theme
{theme}

## Items
* {topic}
* {input}

## Examples
* Items: "Tokyo", "Is it a capital?" -> Tokyo capital whether
* Items: "Dog", "Alive?" -> dog living thing whether"#
    )
}

pub fn generate_question(request: &QuestionGenerationRequest<'_>) -> String {
    let proper_nouns = if request.allow_proper_nouns {
        "allowed"
    } else {
        "forbidden"
    };
    let expected = if request.want_yes { "yes" } else { "no" };

    format!(
        r#"Write exactly one yes/no question that helps identify the topic.

## Theme
{theme}

## Topic
{topic}

## About the topic
{background}

## Questions already asked
{existing}

## Guidelines
* Do not repeat or rephrase an existing question; look from a new angle.
* Ask about general traits that would also apply to other topics of the same theme.
* Never include the topic's name in the question.
* Proper nouns in the question are {proper_nouns}.
* The correct answer to the question must be "{expected}".

## Output
Only the question, ending with a question mark."#,
        theme = request.theme,
        topic = request.topic,
        background = request.background,
        existing = bullet_list(request.existing_questions),
    )
}
