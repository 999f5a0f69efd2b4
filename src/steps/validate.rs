//! Small validation helpers shared by concrete [`super::step::Step`]
//! implementations for the domain-invariant checks deserialization alone
//! can't express (non-empty text, word budgets, id cross-references).

pub fn non_empty(value: &str, field: &'static str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

pub fn non_empty_slice<T>(value: &[T], field: &'static str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

pub fn within_word_budget(text: &str, max_words: usize, field: &'static str) -> Result<(), String> {
    let words = text.split_whitespace().count();
    if words > max_words {
        Err(format!("{field} exceeds word budget: {words} words > {max_words}"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_text() {
        assert!(non_empty("   ", "title").is_err());
        assert!(non_empty("ok", "title").is_ok());
    }

    #[test]
    fn enforces_word_budget() {
        assert!(within_word_budget("one two three", 2, "stem").is_err());
        assert!(within_word_budget("one two", 2, "stem").is_ok());
    }
}
