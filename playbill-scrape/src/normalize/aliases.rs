//! Title alias table
//!
//! Ordered list of (pattern, work, confidence). The first matching pattern wins, so
//! specific patterns ("Henry IV ... 2") must precede general ones ("Henry V").
//! Patterns match case-insensitively anywhere in the raw title.

use once_cell::sync::Lazy;
use playbill_common::CanonicalWork;
use regex::Regex;

/// One alias rule
#[derive(Debug, Clone)]
pub struct Alias {
    pub pattern: Regex,
    pub work: CanonicalWork,
    pub confidence: f64,
}

impl Alias {
    /// Compile a case-insensitive alias
    pub fn new(pattern: &str, work: CanonicalWork, confidence: f64) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            work,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    pub fn matches(&self, title: &str) -> bool {
        self.pattern.is_match(title)
    }
}

/// Built-in alias rules, in match order
///
/// Short acronyms are word-bounded so they cannot fire inside ordinary words.
pub const DEFAULT_ALIAS_RULES: &[(&str, CanonicalWork, f64)] = &[
    (r"r\s*[&+]\s*j|romeo.*juliet", CanonicalWork::RomeoAndJuliet, 0.9),
    (r"scottish\s+play|the\s+scottish\s+play", CanonicalWork::Macbeth, 0.95),
    (r"12th\s+night|twelfth\s+night", CanonicalWork::TwelfthNight, 0.9),
    (r"midsummer|midsummer.*dream|\bmnd\b", CanonicalWork::MidsummerNightsDream, 0.85),
    (r"much\s+ado", CanonicalWork::MuchAdoAboutNothing, 0.9),
    (r"merchant.*venice|\bmov\b", CanonicalWork::MerchantOfVenice, 0.85),
    (r"taming.*shrew", CanonicalWork::TamingOfTheShrew, 0.9),
    (r"as\s+you\s+like\s+it|\bayli\b", CanonicalWork::AsYouLikeIt, 0.9),
    (r"all.*s\s+well|\bawew\b", CanonicalWork::AllsWellThatEndsWell, 0.85),
    (r"winter.*s\s+tale|\bwt\b", CanonicalWork::WintersTale, 0.85),
    (
        r"henry\s+iv[^0-9]*1|henry\s+iv.*part\s*1|1st\s+henry\s+iv|henry4.*part1",
        CanonicalWork::HenryIvPart1,
        0.9,
    ),
    (
        r"henry\s+iv[^0-9]*2|henry\s+iv.*part\s*2|2nd\s+henry\s+iv|henry4.*part2",
        CanonicalWork::HenryIvPart2,
        0.9,
    ),
    // "Henry V" not followed by another numeral letter
    (r"henry\s+v(?:[^iI]|$)", CanonicalWork::HenryV, 0.9),
    (r"henry\s+vi.*part\s*1|henry\s+vi[^0-9]*1|henry6.*part1", CanonicalWork::HenryViPart1, 0.85),
    (r"henry\s+vi.*part\s*2|henry\s+vi[^0-9]*2|henry6.*part2", CanonicalWork::HenryViPart2, 0.85),
    (r"henry\s+vi.*part\s*3|henry\s+vi[^0-9]*3|henry6.*part3", CanonicalWork::HenryViPart3, 0.85),
    (r"henry\s+viii|henry8", CanonicalWork::HenryViii, 0.9),
    (r"king\s+john", CanonicalWork::KingJohn, 0.9),
    (r"richard\s+ii(?:[^iI]|$)", CanonicalWork::RichardIi, 0.9),
    (r"richard\s+iii", CanonicalWork::RichardIii, 0.9),
    (r"coriolanus", CanonicalWork::Coriolanus, 0.9),
    (r"antony.*cleopatra|cleopatra", CanonicalWork::AntonyAndCleopatra, 0.9),
    (r"titus.*andronicus", CanonicalWork::TitusAndronicus, 0.9),
    (r"julius\s+caesar", CanonicalWork::JuliusCaesar, 0.9),
    (r"timon\s+of\s+athens", CanonicalWork::TimonOfAthens, 0.85),
    (r"troilus.*cressida", CanonicalWork::TroilusAndCressida, 0.85),
    (r"pericles", CanonicalWork::Pericles, 0.85),
    (r"cymbeline", CanonicalWork::Cymbeline, 0.85),
    (r"measure\s+for\s+measure", CanonicalWork::MeasureForMeasure, 0.9),
    (r"love.?s?\s+labou?r.?s?\s+lost", CanonicalWork::LovesLaboursLost, 0.9),
    (r"two\s+gentlemen", CanonicalWork::TwoGentlemenOfVerona, 0.9),
    (r"comedy\s+of\s+errors", CanonicalWork::ComedyOfErrors, 0.9),
    (r"merry\s+wives", CanonicalWork::MerryWivesOfWindsor, 0.9),
    (r"twelfth\s+night|12th\s+night", CanonicalWork::TwelfthNight, 0.9),
    (r"winter.?s?\s+tale", CanonicalWork::WintersTale, 0.9),
    (r"taming\s+of\s+the\s+shrew", CanonicalWork::TamingOfTheShrew, 0.9),
    (r"as\s+you\s+like\s+it", CanonicalWork::AsYouLikeIt, 0.9),
    (r"all.?s?\s+well\s+that\s+ends\s+well", CanonicalWork::AllsWellThatEndsWell, 0.9),
    (r"othello", CanonicalWork::Othello, 0.9),
    (r"king\s+lear", CanonicalWork::KingLear, 0.9),
    (r"hamlet", CanonicalWork::Hamlet, 0.9),
    (r"macbeth", CanonicalWork::Macbeth, 0.95),
    (r"tempest", CanonicalWork::Tempest, 0.9),
];

static DEFAULT_ALIASES: Lazy<Vec<Alias>> = Lazy::new(|| {
    DEFAULT_ALIAS_RULES
        .iter()
        .map(|(pattern, work, confidence)| {
            Alias::new(pattern, *work, *confidence).expect("built-in alias pattern must be valid")
        })
        .collect()
});

/// Compiled copy of the built-in alias table
pub fn default_aliases() -> Vec<Alias> {
    DEFAULT_ALIASES.clone()
}
