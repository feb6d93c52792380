//! Extraction prompt. The model is asked for a flat JSON object and nothing
//! else; [`crate::response`] tolerates the usual deviations.

const EXTRACTION_PROMPT: &str = r#"You are an entity extraction assistant. Extract appointment-related entities from the given text.

IMPORTANT RULES:
1. Only extract entities that are EXPLICITLY mentioned in the text
2. Do NOT infer or guess any information
3. Return ONLY a valid JSON object, no other text
4. If an entity is not found, set its value to null
5. Do not add any explanation or commentary

Extract the following entities:
- date_phrase: The date or day mentioned (e.g., "next Friday", "25th January", "tomorrow")
- time_phrase: The time mentioned (e.g., "3pm", "15:00", "morning", "afternoon")
- department: The service, department, or type of appointment (e.g., "dentist", "doctor", "cardiology")

Return format:
{
    "date_phrase": "<extracted date phrase or null>",
    "time_phrase": "<extracted time phrase or null>",
    "department": "<extracted department or null>"
}

Text to analyze:
"#;

pub fn build_prompt(text: &str) -> String {
    format!("{EXTRACTION_PROMPT}{text}")
}
