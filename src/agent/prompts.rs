// Fixed prompt templates for the generate / critique / refine stages
//
// Every template wraps its inputs in <task>, <code> and <critique> tags so the
// backend can tell instructions from payload.

/// Phrase the critique template asks for when no revision is warranted
pub const APPROVAL_SENTINEL: &str = "No changes needed.";

const APPROVAL_MATCH: &str = "no changes needed";

/// Does this critique approve the code as-is?
///
/// Case-insensitive substring test. Any critique that mentions the phrase
/// counts as approval, including ones like "no changes needed unless the
/// input can be empty"; such a critique ends the loop.
pub fn critique_approves(critique: &str) -> bool {
    critique.to_lowercase().contains(APPROVAL_MATCH)
}

pub fn generation_prompt(language: &str, task: &str) -> String {
    format!(
        "Generate {language} code that fulfills the task described between <task></task> tags. \
         Return only the code, without explanations or comments.\n\n\
         <task>{task}</task>\n",
        language = language,
        task = task,
    )
}

pub fn critique_prompt(language: &str, task: &str, code: &str) -> String {
    format!(
        "Analyze the {language} code between <code></code> for correctness, potential bugs, \
         edge cases, and adherence to idiomatic {language} best practices, given the task in \
         <task></task>. Be concise and specific. If the code is correct and requires no changes, \
         respond with: \"{sentinel}\"\n\n\
         <task>{task}</task>\n\
         <code>{code}</code>\n",
        language = language,
        sentinel = APPROVAL_SENTINEL,
        task = task,
        code = code,
    )
}

pub fn refinement_prompt(language: &str, task: &str, code: &str, critique: &str) -> String {
    format!(
        "Revise the {language} code between <code></code> to address the critique in \
         <critique></critique>, while ensuring the code still fulfills the task in <task></task>. \
         Respond with the improved code only, no explanations or comments.\n\n\
         <task>{task}</task>\n\
         <code>{code}</code>\n\
         <critique>{critique}</critique>\n",
        language = language,
        task = task,
        code = code,
        critique = critique,
    )
}
