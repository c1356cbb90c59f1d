use crate::types::Conference;

/// One entry of the category rule table: if any keyword occurs in the
/// record's text, the rule's category and banner apply.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub keywords: &'static [&'static str],
    pub category: &'static str,
    pub banner: &'static str,
}

/// Ordered rule table; the first matching rule wins. Evaluated once per
/// record, so the result can be cached alongside the read model.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        keywords: &["ai", "machine learning", "intelligence"],
        category: "artificial-intelligence",
        banner: "https://images.unsplash.com/photo-1677442136019-21780ecad995?auto=format&fit=crop&q=80&w=1200",
    },
    CategoryRule {
        keywords: &["robot", "engineering"],
        category: "robotics",
        banner: "https://images.unsplash.com/photo-1485827404703-89b55fcc595e?auto=format&fit=crop&q=80&w=1200",
    },
    CategoryRule {
        keywords: &["bio", "medicine", "health"],
        category: "life-sciences",
        banner: "https://images.unsplash.com/photo-1532187863486-abf9d39d9995?auto=format&fit=crop&q=80&w=1200",
    },
    CategoryRule {
        keywords: &["data", "cloud", "network"],
        category: "data-systems",
        banner: "https://images.unsplash.com/photo-1558494949-ef010cbdcc31?auto=format&fit=crop&q=80&w=1200",
    },
    CategoryRule {
        keywords: &["physic", "space", "quantum"],
        category: "physics",
        banner: "https://images.unsplash.com/photo-1451187580459-43490279c0fa?auto=format&fit=crop&q=80&w=1200",
    },
    CategoryRule {
        keywords: &["chem", "material"],
        category: "chemistry",
        banner: "https://images.unsplash.com/photo-1532187863486-abf9d39d9995?auto=format&fit=crop&q=80&w=1200",
    },
];

pub const DEFAULT_CATEGORY: &str = "general";
pub const DEFAULT_BANNER: &str =
    "https://images.unsplash.com/photo-1517048676732-d65bc937f952?auto=format&fit=crop&q=80&w=1200";

/// Classify a conference by its name, topics and description.
pub fn categorize(conference: &Conference) -> (&'static str, &'static str) {
    let haystack = format!(
        "{} {} {}",
        conference.name,
        conference.topics.as_deref().unwrap_or(""),
        conference.description.as_deref().unwrap_or("")
    )
    .to_lowercase();

    for rule in CATEGORY_RULES {
        if rule.keywords.iter().any(|kw| haystack.contains(kw)) {
            return (rule.category, rule.banner);
        }
    }
    (DEFAULT_CATEGORY, DEFAULT_BANNER)
}
