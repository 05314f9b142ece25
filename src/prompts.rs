//! Prompt construction for the medicine classification call.
//!
//! Every prompt lives here so it can be inspected in unit tests without a
//! model. Callers can override the default via
//! [`crate::config::AnalysisConfig::prompt_template`]; the template below is
//! used only when no override is provided.

/// Default prompt template.
///
/// `{disease}` is replaced with the target condition and `{block}` with the
/// chunk text. Literal braces of the JSON example are written as-is.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an experienced clinical pharmacist so first extract medicine details only from below prompt.

For every medicine (one per line) in the list below, classify it as
RELEVANT for treating or managing "{disease}" or IRRELEVANT
(unrelated/contraindicated). Every medicine goes into exactly one of the two lists.
Return strictly valid JSON:

{
  "relevant": [
    {"name":"<Med A>","explanation":"<15-30 word reason it helps {disease}>"}
  ],
  "irrelevant": [
    {"name":"<Med X>","explanation":"<brief reason it is not used / risky>"}
  ]
}

• Keep keys exactly as shown.
• Do not add any explanations outside the JSON block.

List:
{block}"#;

/// Render the prompt for one chunk using the default template.
pub fn build_prompt(disease: &str, block: &str) -> String {
    render_template(DEFAULT_PROMPT_TEMPLATE, disease, block)
}

/// Render an arbitrary template.
///
/// Placeholders are substituted in a single left-to-right pass: inserted
/// text is never rescanned, so a disease containing `{block}` or document
/// text containing `{disease}` comes through verbatim.
pub fn render_template(template: &str, disease: &str, block: &str) -> String {
    let disease = disease.trim();
    let mut out = String::with_capacity(template.len() + disease.len() + block.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{disease}") {
            out.push_str(disease);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{block}") {
            out.push_str(block);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_disease_and_block() {
        let p = build_prompt("Type 2 Diabetes", "Metformin 500mg\nAspirin");
        assert!(p.contains("\"Type 2 Diabetes\""));
        assert!(p.contains("reason it helps Type 2 Diabetes"));
        assert!(p.ends_with("Metformin 500mg\nAspirin"));
    }

    #[test]
    fn prompt_mandates_json_shape() {
        let p = build_prompt("asthma", "Salbutamol");
        assert!(p.contains("\"relevant\""));
        assert!(p.contains("\"irrelevant\""));
        assert!(p.contains("\"name\""));
        assert!(p.contains("\"explanation\""));
        assert!(p.contains("15-30 word"));
        assert!(p.contains("Do not add any explanations outside the JSON block"));
    }

    #[test]
    fn block_text_is_not_reinterpreted() {
        let p = build_prompt("gout", "literal {disease} in document");
        assert!(p.ends_with("literal {disease} in document"));
    }

    #[test]
    fn disease_text_is_not_reinterpreted() {
        let p = render_template("D={disease}\n{block}", "odd {block} name", "Aspirin {disease}");
        assert_eq!(p, "D=odd {block} name\nAspirin {disease}");
    }

    #[test]
    fn unknown_braces_are_kept() {
        let p = render_template("{\"relevant\": []} {x} {disease}", "flu", "");
        assert_eq!(p, "{\"relevant\": []} {x} flu");
    }

    #[test]
    fn custom_template() {
        let p = render_template("D={disease}\n{block}\n", " flu ", "Oseltamivir");
        assert_eq!(p, "D=flu\nOseltamivir");
    }
}
