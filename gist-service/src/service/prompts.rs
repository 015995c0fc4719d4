//! Prompts for the derived-artifact generators.

pub(crate) const TRANSLATION_SYSTEM_PROMPT: &str = "You are a professional translator. \
    Translate accurately while preserving the original meaning and tone.";

pub(crate) const QNA_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates educational Q&A pairs. Always return valid JSON only.";

pub(crate) fn translation_prompt(language: &str, text: &str) -> String {
    format!(
        "Translate the following text to {language}. Maintain the same tone and meaning. \
         Only return the translated text, nothing else.\n\nText to translate:\n{text}\n\nTranslation:"
    )
}

pub(crate) fn qna_prompt(num_questions: usize, text: &str) -> String {
    format!(
        r#"Based on the following text, generate {num_questions} insightful question-answer pairs. The questions should cover the main topics and key information.

Return the response in valid JSON only (no markdown, no extra text):
[
  {{
    "question": "What is the main topic?",
    "answer": "The main topic is..."
  }}
]

Text:
{text}

JSON:"#
    )
}
