//! Turns raw model output into structured recipe fields.
//!
//! The recipe model emits one flat string per candidate, roughly:
//!
//! ```text
//! title: tomato soup <section> ingredients: 2 tomatoes <sep> 1 onion <section> directions: chop <sep> simmer
//! ```
//!
//! Parsing never fails. When markers are missing the output degrades to the
//! first line as title and the whole cleaned text as instructions.

pub const SECTION_MARKER: &str = "<section>";
pub const ITEM_MARKER: &str = "<sep>";
pub const ITEM_SEPARATOR: &str = "--";

pub const DEFAULT_TITLE: &str = "Untitled Recipe";
pub const MAX_TITLE_CHARS: usize = 80;
pub const MAX_DESCRIPTION_CHARS: usize = 200;
const MAX_DESCRIPTION_INGREDIENTS: usize = 6;

const TITLE_PREFIX: &str = "title:";
const INGREDIENTS_PREFIX: &str = "ingredients:";
const DIRECTIONS_PREFIX: &str = "directions:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecipe {
    pub title: String,
    pub short_description: String,
    pub instructions: String,
}

/// Maps the model's section/item markers to plain separators and strips
/// every special token.
pub fn clean_special_tokens(raw: &str, special_tokens: &[String]) -> String {
    let mut text = raw
        .replace(SECTION_MARKER, "\n")
        .replace(ITEM_MARKER, ITEM_SEPARATOR);

    for token in special_tokens.iter().filter(|t| !t.is_empty()) {
        text = text.replace(token.as_str(), "");
    }

    text.trim().to_string()
}

pub fn parse_recipe_output(raw: &str, special_tokens: &[String]) -> ParsedRecipe {
    let cleaned = clean_special_tokens(raw, special_tokens);
    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(first_line) = lines.first() else {
        return ParsedRecipe {
            title: DEFAULT_TITLE.to_string(),
            short_description: String::new(),
            instructions: cleaned,
        };
    };

    // No early exit: a repeated prefix keeps its last occurrence.
    let mut title: Option<&str> = None;
    let mut ingredients_line: Option<&str> = None;
    let mut directions_line: Option<&str> = None;
    for line in &lines {
        if let Some(rest) = strip_prefix_ignore_case(line, TITLE_PREFIX) {
            title = Some(rest).filter(|t| !t.is_empty());
        } else if let Some(rest) = strip_prefix_ignore_case(line, INGREDIENTS_PREFIX) {
            ingredients_line = Some(rest);
        } else if let Some(rest) = strip_prefix_ignore_case(line, DIRECTIONS_PREFIX) {
            directions_line = Some(rest);
        }
    }

    // A literal default title counts as missing.
    let title = match title.filter(|t| *t != DEFAULT_TITLE) {
        Some(t) => t.to_string(),
        None => truncate_chars(first_line, MAX_TITLE_CHARS),
    };

    let ingredients = ingredients_line.map(split_items).unwrap_or_default();
    let short_description = if ingredients.is_empty() {
        String::new()
    } else {
        let shown = &ingredients[..ingredients.len().min(MAX_DESCRIPTION_INGREDIENTS)];
        format!("Ingredients: {}", shown.join(", "))
    };

    let steps = directions_line.map(split_items).unwrap_or_default();
    let instructions = if steps.is_empty() {
        cleaned.clone()
    } else {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ParsedRecipe {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        short_description: truncate_chars(&short_description, MAX_DESCRIPTION_CHARS),
        instructions,
    }
}

/// Returns the trimmed text after `prefix` when `line` starts with it,
/// compared case-insensitively.
fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(line[prefix.len()..].trim())
    } else {
        None
    }
}

fn split_items(line: &str) -> Vec<String> {
    line.split(ITEM_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(capitalize)
        .collect()
}

/// Title-cases the first character and lower-cases the rest.
fn capitalize(s: &str) -> String {
    let Some(first) = s.chars().next() else {
        return String::new();
    };

    // Lower-case the whole string so final sigma sees its full context, then
    // swap in the title-cased first character.
    let lowered = s.to_lowercase();
    let first_lower_len: usize = first.to_lowercase().map(char::len_utf8).sum();
    let mut out = titlecase(first);
    out.push_str(&lowered[first_lower_len..]);
    out
}

/// Title case of one character. Digraphs have a dedicated title form; an
/// upper-case expansion (`ß` -> `SS`, `ﬁ` -> `FI`) keeps only its head upper.
fn titlecase(c: char) -> String {
    match c {
        'Ǆ' | 'ǅ' | 'ǆ' => return 'ǅ'.to_string(),
        'Ǉ' | 'ǈ' | 'ǉ' => return 'ǈ'.to_string(),
        'Ǌ' | 'ǋ' | 'ǌ' => return 'ǋ'.to_string(),
        'Ǳ' | 'ǲ' | 'ǳ' => return 'ǲ'.to_string(),
        _ => {}
    }

    let mut upper = c.to_uppercase();
    let mut out = String::new();
    if let Some(head) = upper.next() {
        out.push(head);
    }
    out.extend(upper.flat_map(char::to_lowercase));
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t5_special_tokens() -> Vec<String> {
        vec!["<pad>".to_string(), "</s>".to_string(), "<unk>".to_string()]
    }

    #[test]
    fn parses_all_three_sections() {
        let raw = "title: X\ningredients: A -- B\ndirections: step1 -- step2";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.title, "X");
        assert_eq!(parsed.short_description, "Ingredients: A, B");
        assert_eq!(parsed.instructions, "1. Step1\n2. Step2");
    }

    #[test]
    fn parses_raw_model_markers() {
        let raw = "<pad> title: tomato soup <section> ingredients: 2 TOMATOES <sep> 1 onion \
                   <section> directions: chop the onion. <sep> simmer everything.</s>";
        let parsed = parse_recipe_output(raw, &t5_special_tokens());

        assert_eq!(parsed.title, "tomato soup");
        assert_eq!(parsed.short_description, "Ingredients: 2 tomatoes, 1 onion");
        assert_eq!(parsed.instructions, "1. Chop the onion.\n2. Simmer everything.");
    }

    #[test]
    fn unmarked_output_falls_back_to_first_line() {
        let raw = "  \n  A lovely dish  \nmix and serve\n";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.title, "A lovely dish");
        assert_eq!(parsed.short_description, "");
        assert_eq!(parsed.instructions, "A lovely dish  \nmix and serve");
    }

    #[test]
    fn empty_output_uses_default_title() {
        let parsed = parse_recipe_output("<pad></s>  ", &t5_special_tokens());

        assert_eq!(parsed.title, DEFAULT_TITLE);
        assert_eq!(parsed.short_description, "");
        assert_eq!(parsed.instructions, "");
    }

    #[test]
    fn prefixes_are_case_insensitive() {
        let raw = "TITLE: Pancakes\nIngredients: flour -- milk\nDIRECTIONS: whisk";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.title, "Pancakes");
        assert_eq!(parsed.short_description, "Ingredients: Flour, Milk");
        assert_eq!(parsed.instructions, "1. Whisk");
    }

    #[test]
    fn repeated_directions_use_last_occurrence() {
        let raw = "title: Stew\ndirections: first -- plan\ndirections: second -- plan";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.instructions, "1. Second\n2. Plan");
    }

    #[test]
    fn empty_title_line_falls_back_to_first_line() {
        let raw = "title:\ningredients: salt";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.title, "title:");
        assert_eq!(parsed.short_description, "Ingredients: Salt");
    }

    #[test]
    fn literal_default_title_falls_back_to_first_line() {
        let parsed = parse_recipe_output("title: Untitled Recipe\ningredients: a", &[]);

        assert_eq!(parsed.title, "title: Untitled Recipe");
        assert_eq!(parsed.short_description, "Ingredients: A");
    }

    #[test]
    fn capitalization_follows_unicode_title_case() {
        let parsed = parse_recipe_output("title: X\ningredients: ΟΔΟΣ -- ßa -- ǆem -- ﬁg", &[]);

        assert_eq!(parsed.short_description, "Ingredients: Οδος, Ssa, ǅem, Fig");
    }

    #[test]
    fn description_lists_at_most_six_ingredients() {
        let raw = "title: Big\ningredients: a -- b -- c -- d -- e -- f -- g -- h";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.short_description, "Ingredients: A, B, C, D, E, F");
    }

    #[test]
    fn separators_without_items_keep_cleaned_text() {
        let raw = "title: Odd\ningredients: -- --\ndirections:  -- ";
        let parsed = parse_recipe_output(raw, &[]);

        assert_eq!(parsed.short_description, "");
        assert_eq!(parsed.instructions, "title: Odd\ningredients: -- --\ndirections:  --");
    }

    #[test]
    fn title_and_description_are_capped() {
        let long_title = "t".repeat(300);
        let long_item = "i".repeat(150);
        let raw = format!("title: {long_title}\ningredients: {long_item} -- {long_item}");
        let parsed = parse_recipe_output(&raw, &[]);

        assert_eq!(parsed.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(parsed.short_description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn fallback_title_is_capped() {
        let raw = "x".repeat(500);
        let parsed = parse_recipe_output(&raw, &[]);

        assert_eq!(parsed.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(parsed.instructions, raw);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let raw = format!("title: {}", "é".repeat(100));
        let parsed = parse_recipe_output(&raw, &[]);

        assert_eq!(parsed.title, "é".repeat(MAX_TITLE_CHARS));
    }

    #[test]
    fn special_tokens_are_removed_everywhere() {
        let cleaned = clean_special_tokens("<pad>a<unk>b</s>", &t5_special_tokens());
        assert_eq!(cleaned, "ab");
    }
}
