/// Persona the model is asked to play for every reply.
pub const PERSONA: &str = "あなたは親しみやすく、でも丁寧な日本語で会話するアシスタントです。\n\
ユーザーの質問に対して、分かりやすく具体的に回答してください。\n\
必要に応じて、例を交えながら説明することもできます。";

const USER_LABEL: &str = "\n\nユーザー: ";
const ASSISTANT_LABEL: &str = "\nアシスタント: ";

/// Build the single free-text prompt for the inference endpoint.
/// The user text goes in verbatim, command marker included.
pub fn compose_prompt(user_text: &str) -> String {
    let mut prompt =
        String::with_capacity(PERSONA.len() + USER_LABEL.len() + user_text.len() + ASSISTANT_LABEL.len());
    prompt.push_str(PERSONA);
    prompt.push_str(USER_LABEL);
    prompt.push_str(user_text);
    prompt.push_str(ASSISTANT_LABEL);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_is_prefix() {
        let prompt = compose_prompt("こんにちは");
        assert!(prompt.starts_with(PERSONA));
    }

    #[test]
    fn test_user_text_is_verbatim() {
        let text = "/l 富士山について教えて";
        let prompt = compose_prompt(text);
        assert!(prompt.contains(text));
        assert_eq!(
            prompt,
            format!("{}\n\nユーザー: {}\nアシスタント: ", PERSONA, text)
        );
    }

    #[test]
    fn test_ends_with_assistant_label() {
        let prompt = compose_prompt("");
        assert!(prompt.ends_with("アシスタント: "));
    }

    #[test]
    fn test_persona_spans_multiple_lines() {
        assert_eq!(PERSONA.lines().count(), 3);
    }
}
