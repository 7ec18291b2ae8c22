/// Phrases the open-vocabulary detector is prompted with. Chosen to cover
/// the issue categories the report prompt asks about.
pub const INFRASTRUCTURE_PROMPTS: &[&str] = &[
    "pothole",
    "road crack",
    "damaged road",
    "faded road marking",
    "broken sidewalk",
    "cracked pavement",
    "damaged curb",
    "manhole cover",
    "storm drain",
    "clogged gutter",
    "standing water",
    "graffiti",
    "litter",
    "illegal dumping",
    "damaged sign",
    "obstructed traffic sign",
    "broken street light",
    "fallen tree",
    "overgrown vegetation",
    "construction barrier",
];

/// Formats prompts the way grounding models expect: `a . b . c .`
pub fn grounding_caption(prompts: &[String]) -> String {
    prompts
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .map(|p| format!("{} .", p))
        .collect::<Vec<_>>()
        .join(" ")
}
