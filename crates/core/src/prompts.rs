//! Message builders for the completion calls made by the analysis and chat flows.

use crate::models::{ChatMessage, RetrievedWindow};

pub const SUMMARY_SYSTEM: &str = "You are a careful medical lab report assistant. \
Summarize the report for the patient in plain language: list each test with its value, \
unit and reference range, flag values outside the range, and close with general \
health goals. Do not diagnose.";

pub const EXTRACTION_SYSTEM: &str = "You extract structured findings from one section of a \
lab report. Return a JSON array of objects with the keys \"test\", \"value\", \"unit\", \
\"reference_range\" and \"status\" (normal, high, low or unknown). Return [] when the \
section holds no results.";

pub const SYNTHESIS_SYSTEM: &str = "You consolidate findings extracted from consecutive \
sections of one lab report into a single patient-friendly summary. Merge duplicate tests, \
keep every abnormal value, and close with general health goals. Do not diagnose.";

pub const CHAT_SYSTEM: &str = "You answer questions about a patient's lab report using only \
the provided excerpts. If the excerpts do not contain the answer, say so. Do not diagnose.";

pub fn summary_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM),
        ChatMessage::user(format!("Lab report:\n{text}")),
    ]
}

pub fn extraction_messages(chunk_text: &str, index: usize, total: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(EXTRACTION_SYSTEM),
        ChatMessage::user(format!(
            "Section {} of {total}:\n{chunk_text}",
            index + 1
        )),
    ]
}

pub fn synthesis_messages(findings: &str, sections: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYNTHESIS_SYSTEM),
        ChatMessage::user(format!(
            "Findings from {sections} section(s), in report order:\n\n{findings}"
        )),
    ]
}

pub fn chat_messages(question: &str, context: &[RetrievedWindow]) -> Vec<ChatMessage> {
    let excerpts = context
        .iter()
        .map(|window| format!("[excerpt {}]\n{}", window.chunk.index + 1, window.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(CHAT_SYSTEM),
        ChatMessage::user(format!(
            "Report excerpts:\n{excerpts}\n\nQuestion: {question}"
        )),
    ]
}
