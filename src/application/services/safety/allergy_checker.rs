use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllergyCheckResult {
    pub has_potential_allergy: bool,
    /// `Milk` for a direct hit, `Milk(cheese)` when found through an expansion.
    pub allergens: Vec<String>,
}

/// Case-insensitive substring matching of a child's allergens against a
/// generated answer, widened by a dictionary of related foods.
///
/// Matching does not respect word boundaries, so "egg" also hits "eggplant".
#[derive(Debug)]
pub struct AllergyChecker {
    expansions: HashMap<&'static str, &'static [&'static str]>,
}

const DAIRY: &[&str] = &[
    "cheese", "yogurt", "yoghurt", "butter", "cream", "whey", "casein", "ghee", "custard",
    "formula", "ice cream", "lactose",
];
const EGG: &[&str] = &["mayonnaise", "meringue", "omelet", "omelette", "custard", "albumin"];
const PEANUT: &[&str] = &["peanut butter", "groundnut", "satay", "arachis"];
const TREE_NUT: &[&str] = &[
    "almond", "cashew", "walnut", "pecan", "hazelnut", "pistachio", "macadamia", "brazil nut",
    "nutella", "marzipan", "praline",
];
const WHEAT: &[&str] = &[
    "bread", "pasta", "flour", "cracker", "couscous", "semolina", "cereal", "noodle", "toast",
    "biscuit",
];
const SOY: &[&str] = &["tofu", "edamame", "soya", "miso", "tempeh", "soy sauce"];
const FISH: &[&str] = &["salmon", "tuna", "cod", "sardine", "anchovy", "trout", "mackerel"];
const SHELLFISH: &[&str] = &["shrimp", "prawn", "crab", "lobster", "crayfish", "mussel", "oyster", "clam", "scallop"];
const SESAME: &[&str] = &["tahini", "hummus", "halva", "sesame oil"];

impl Default for AllergyChecker {
    fn default() -> Self {
        let expansions: HashMap<&'static str, &'static [&'static str]> = HashMap::from([
            ("milk", DAIRY),
            ("dairy", DAIRY),
            ("egg", EGG),
            ("eggs", EGG),
            ("peanut", PEANUT),
            ("peanuts", PEANUT),
            ("tree nut", TREE_NUT),
            ("tree nuts", TREE_NUT),
            ("nuts", TREE_NUT),
            ("wheat", WHEAT),
            ("gluten", WHEAT),
            ("soy", SOY),
            ("fish", FISH),
            ("shellfish", SHELLFISH),
            ("sesame", SESAME),
        ]);
        Self { expansions }
    }
}

impl AllergyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, response_text: &str, allergens: &[String]) -> AllergyCheckResult {
        let haystack = response_text.to_lowercase();

        let matched: Vec<String> = allergens
            .iter()
            .filter_map(|allergen| self.match_allergen(&haystack, allergen))
            .collect();

        AllergyCheckResult {
            has_potential_allergy: !matched.is_empty(),
            allergens: matched,
        }
    }

    fn match_allergen(&self, haystack: &str, allergen: &str) -> Option<String> {
        let needle = allergen.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if haystack.contains(&needle) {
            return Some(allergen.trim().to_string());
        }

        self.expansions
            .get(needle.as_str())
            .and_then(|terms| terms.iter().find(|term| haystack.contains(*term)))
            .map(|term| format!("{}({})", allergen.trim(), term))
    }
}
