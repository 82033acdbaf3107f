//! Prompt templates. Field names in the exam template are the contract the parser decodes.

pub fn grounded_answer_prompt(question: &str, context_blocks: &str) -> String {
    // Contract:
    // - Use ONLY the supplied context.
    // - Say so explicitly when the context is insufficient.
    format!(
        r#"You are answering a question about an uploaded PDF document.

Rules (non-negotiable):
1) Use ONLY the context passages below. Do not use outside knowledge.
2) If the passages do not contain enough information, say that the document does not provide enough information to answer.
3) Be concise and precise.

Context passages:
{context_blocks}

Question:
{question}

Answer:
"#
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionLimits {
    pub mcq: usize,
    pub short_answer: usize,
    pub essay: usize,
}

pub fn exam_batch_prompt(
    first_page: u32,
    last_page: u32,
    limits: QuestionLimits,
    page_text: Option<&str>,
) -> String {
    let text_section = match page_text {
        Some(t) if !t.trim().is_empty() => format!(
            "\nExtracted text of these pages (auxiliary; the images are authoritative):\n{t}\n"
        ),
        _ => String::new(),
    };
    format!(
        r#"You are an expert professor helping students prepare for exams.
The attached images are pages {first_page} to {last_page} of a study-material PDF.

CRITICAL INSTRUCTIONS:
1. IGNORE administrative pages such as syllabus, grading policy, attendance policy, course logistics, table of contents, or welcome pages.
2. FOCUS ONLY on technical subject matter: core concepts, definitions, formulas, and DIAGRAMS.
3. Pay special attention to diagrams, charts and figures.
4. If the pages contain only administrative content, return the JSON structure with empty lists.
5. Generate AT MOST {mcq} multiple-choice, {short} short-answer and {essay} essay questions.
{text_section}
Return ONLY a JSON object with exactly this shape:
{{
  "mcq": [{{"question": "...", "options": ["...", "...", "...", "..."], "answer_index": 0}}],
  "short_answer": [{{"question": "...", "answer": "..."}}],
  "essay": [{{"question": "...", "key_points": ["...", "..."]}}]
}}
Each multiple-choice question has exactly four options without letter prefixes; "answer_index" is the 0-based index of the correct option.
"#,
        mcq = limits.mcq,
        short = limits.short_answer,
        essay = limits.essay,
    )
}
