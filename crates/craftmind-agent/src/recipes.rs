//! Built-in recipe book.
//!
//! A small static table standing in for full game recipe data. Lookup is
//! case-insensitive with a leading article stripped, exact name first,
//! then substring match. Always returns a sentence the conversation
//! engine can hand to the generator verbatim.

use craftmind_traits::RecipeLookup;

/// (item name, ingredient list, needs a crafting table)
const RECIPES: &[(&str, &str, bool)] = &[
    ("crafting table", "4 planks", false),
    ("planks", "1 log of any kind (yields 4)", false),
    ("stick", "2 planks (yields 4)", false),
    ("torch", "1 stick and 1 coal (yields 4)", false),
    ("furnace", "8 cobblestone", true),
    ("chest", "8 planks", true),
    ("wooden pickaxe", "3 planks and 2 sticks", true),
    ("stone pickaxe", "3 cobblestone and 2 sticks", true),
    ("wooden sword", "2 planks and 1 stick", true),
    ("stone sword", "2 cobblestone and 1 stick", true),
    ("bed", "3 wool and 3 planks", true),
    ("ladder", "7 sticks (yields 3)", true),
    ("bread", "3 wheat", true),
    ("boat", "5 planks", true),
    ("door", "6 planks (yields 3)", true),
];

pub struct StaticRecipeBook;

impl StaticRecipeBook {
    fn find(query: &str) -> Option<&'static (&'static str, &'static str, bool)> {
        let needle = normalize(query);
        RECIPES
            .iter()
            .find(|(name, _, _)| *name == needle)
            .or_else(|| {
                RECIPES
                    .iter()
                    .find(|(name, _, _)| name.contains(&needle) || needle.contains(name))
            })
    }
}

fn normalize(query: &str) -> String {
    let lower = query.trim().to_lowercase();
    let stripped = lower
        .strip_prefix("a ")
        .or_else(|| lower.strip_prefix("an "))
        .unwrap_or(&lower);
    stripped.trim().to_string()
}

impl RecipeLookup for StaticRecipeBook {
    fn lookup(&self, item_name: &str) -> String {
        match Self::find(item_name) {
            Some((name, ingredients, needs_table)) => {
                let mut info = format!("To make {name}, you need: {ingredients}.");
                if *needs_table {
                    info.push_str(" You'll need a crafting table for this one.");
                }
                info
            }
            None => format!(
                "I couldn't find a recipe for {}.",
                normalize(item_name)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_wins() {
        let info = StaticRecipeBook.lookup("torch");
        assert_eq!(
            info,
            "To make torch, you need: 1 stick and 1 coal (yields 4)."
        );
    }

    #[test]
    fn articles_and_case_are_ignored() {
        let info = StaticRecipeBook.lookup("A Crafting Table");
        assert!(info.starts_with("To make crafting table, you need: 4 planks."));
    }

    #[test]
    fn table_requirement_is_mentioned() {
        let info = StaticRecipeBook.lookup("furnace");
        assert!(info.contains("crafting table"));
    }

    #[test]
    fn substring_match_covers_qualified_names() {
        let info = StaticRecipeBook.lookup("oak door");
        assert!(info.starts_with("To make door"));
    }

    #[test]
    fn unknown_items_get_a_polite_miss() {
        let info = StaticRecipeBook.lookup("warp drive");
        assert_eq!(info, "I couldn't find a recipe for warp drive.");
    }
}
