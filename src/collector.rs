//! Collects parsed candidates into the final, de-duplicated recipe list.

use std::collections::HashSet;

use uuid::Uuid;

use crate::parser::parse_recipe_output;
use crate::types::Recipe;

/// Upper bound on recipes returned for one request.
pub const MAX_RECIPES: usize = 3;

/// Parses every raw candidate and keeps the first recipe seen for each
/// case-insensitive title, stopping once `MAX_RECIPES` are collected.
pub fn collect_recipes<S: AsRef<str>>(
    raw_outputs: &[S],
    special_tokens: &[String],
) -> Vec<Recipe> {
    let mut seen = HashSet::new();
    let mut recipes = Vec::with_capacity(MAX_RECIPES);

    for raw in raw_outputs {
        let parsed = parse_recipe_output(raw.as_ref(), special_tokens);
        if !seen.insert(parsed.title.to_lowercase()) {
            tracing::debug!(title = %parsed.title, "dropping duplicate recipe");
            continue;
        }

        recipes.push(Recipe {
            id: Uuid::new_v4().to_string(),
            title: parsed.title,
            short_description: parsed.short_description,
            instructions: parsed.instructions,
        });

        if recipes.len() >= MAX_RECIPES {
            break;
        }
    }

    recipes
}
