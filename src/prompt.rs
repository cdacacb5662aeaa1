//! Ingredient normalization and prompt construction.

/// Input prefix the recipe model was trained with.
pub const PROMPT_PREFIX: &str = "items: ";

/// Trims and lowercases every ingredient, dropping the ones left empty.
pub fn normalize_ingredients(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|ing| ing.trim())
        .filter(|ing| !ing.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Builds the model prompt from an already normalized ingredient list.
pub fn build_prompt(ingredients: &[String]) -> String {
    format!("{PROMPT_PREFIX}{}", ingredients.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_and_builds_prompt() {
        let normalized = normalize_ingredients(&strings(&["Tomato", "  ", "cheese"]));
        assert_eq!(normalized, strings(&["tomato", "cheese"]));
        assert_eq!(build_prompt(&normalized), "items: tomato, cheese");
    }

    #[test]
    fn keeps_order_and_inner_whitespace() {
        let normalized = normalize_ingredients(&strings(&["  Olive Oil ", "BASIL", "\t"]));
        assert_eq!(normalized, strings(&["olive oil", "basil"]));
    }

    #[test]
    fn all_blank_input_normalizes_to_nothing() {
        assert!(normalize_ingredients(&strings(&["", "   ", "\n"])).is_empty());
        assert!(normalize_ingredients(&[]).is_empty());
    }

    #[test]
    fn single_ingredient_prompt_has_no_separator() {
        assert_eq!(build_prompt(&strings(&["egg"])), "items: egg");
    }
}
