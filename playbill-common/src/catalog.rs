//! Canonical work catalog
//!
//! Every scraped title resolves to exactly one [`CanonicalWork`]. The set is closed:
//! titles that match nothing land on [`CanonicalWork::Other`] instead of becoming
//! new entries.
//!
//! Persistence uses the stable SCREAMING_SNAKE code from [`CanonicalWork::code`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Dramatic category of a canonical work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkCategory {
    Comedy,
    History,
    Tragedy,
    Romance,
    Other,
}

impl WorkCategory {
    /// Plural heading used in listings ("Comedies", "Histories", ...)
    pub fn heading(&self) -> &'static str {
        match self {
            WorkCategory::Comedy => "Comedies",
            WorkCategory::History => "Histories",
            WorkCategory::Tragedy => "Tragedies",
            WorkCategory::Romance => "Romances",
            WorkCategory::Other => "Other",
        }
    }
}

/// One known play, or the catch-all `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum CanonicalWork {
    // Comedies
    AllsWellThatEndsWell,
    AsYouLikeIt,
    ComedyOfErrors,
    Cymbeline,
    LovesLaboursLost,
    MeasureForMeasure,
    MerchantOfVenice,
    MerryWivesOfWindsor,
    MidsummerNightsDream,
    MuchAdoAboutNothing,
    Pericles,
    TamingOfTheShrew,
    TwelfthNight,
    TwoGentlemenOfVerona,
    WintersTale,

    // Histories
    HenryIvPart1,
    HenryIvPart2,
    HenryV,
    HenryViPart1,
    HenryViPart2,
    HenryViPart3,
    HenryViii,
    KingJohn,
    RichardIi,
    RichardIii,

    // Tragedies
    AntonyAndCleopatra,
    Coriolanus,
    Hamlet,
    JuliusCaesar,
    KingLear,
    Macbeth,
    Othello,
    RomeoAndJuliet,
    TimonOfAthens,
    TitusAndronicus,
    TroilusAndCressida,

    // Romances
    Tempest,

    Other,
}

impl CanonicalWork {
    /// Stable enumeration order
    ///
    /// Fuzzy title resolution visits works in this order, so earlier entries win ties.
    pub const ALL: [CanonicalWork; 38] = [
        CanonicalWork::AllsWellThatEndsWell,
        CanonicalWork::AsYouLikeIt,
        CanonicalWork::ComedyOfErrors,
        CanonicalWork::Cymbeline,
        CanonicalWork::LovesLaboursLost,
        CanonicalWork::MeasureForMeasure,
        CanonicalWork::MerchantOfVenice,
        CanonicalWork::MerryWivesOfWindsor,
        CanonicalWork::MidsummerNightsDream,
        CanonicalWork::MuchAdoAboutNothing,
        CanonicalWork::Pericles,
        CanonicalWork::TamingOfTheShrew,
        CanonicalWork::TwelfthNight,
        CanonicalWork::TwoGentlemenOfVerona,
        CanonicalWork::WintersTale,
        CanonicalWork::HenryIvPart1,
        CanonicalWork::HenryIvPart2,
        CanonicalWork::HenryV,
        CanonicalWork::HenryViPart1,
        CanonicalWork::HenryViPart2,
        CanonicalWork::HenryViPart3,
        CanonicalWork::HenryViii,
        CanonicalWork::KingJohn,
        CanonicalWork::RichardIi,
        CanonicalWork::RichardIii,
        CanonicalWork::AntonyAndCleopatra,
        CanonicalWork::Coriolanus,
        CanonicalWork::Hamlet,
        CanonicalWork::JuliusCaesar,
        CanonicalWork::KingLear,
        CanonicalWork::Macbeth,
        CanonicalWork::Othello,
        CanonicalWork::RomeoAndJuliet,
        CanonicalWork::TimonOfAthens,
        CanonicalWork::TitusAndronicus,
        CanonicalWork::TroilusAndCressida,
        CanonicalWork::Tempest,
        CanonicalWork::Other,
    ];

    /// Persistence code
    pub fn code(&self) -> &'static str {
        match self {
            CanonicalWork::AllsWellThatEndsWell => "ALLS_WELL_THAT_ENDS_WELL",
            CanonicalWork::AsYouLikeIt => "AS_YOU_LIKE_IT",
            CanonicalWork::ComedyOfErrors => "COMEDY_OF_ERRORS",
            CanonicalWork::Cymbeline => "CYMBELINE",
            CanonicalWork::LovesLaboursLost => "LOVES_LABOURS_LOST",
            CanonicalWork::MeasureForMeasure => "MEASURE_FOR_MEASURE",
            CanonicalWork::MerchantOfVenice => "MERCHANT_OF_VENICE",
            CanonicalWork::MerryWivesOfWindsor => "MERRY_WIVES_OF_WINDSOR",
            CanonicalWork::MidsummerNightsDream => "MIDSUMMER_NIGHTS_DREAM",
            CanonicalWork::MuchAdoAboutNothing => "MUCH_ADO_ABOUT_NOTHING",
            CanonicalWork::Pericles => "PERICLES",
            CanonicalWork::TamingOfTheShrew => "TAMING_OF_THE_SHREW",
            CanonicalWork::TwelfthNight => "TWELFTH_NIGHT",
            CanonicalWork::TwoGentlemenOfVerona => "TWO_GENTLEMEN_OF_VERONA",
            CanonicalWork::WintersTale => "WINTERS_TALE",
            CanonicalWork::HenryIvPart1 => "HENRY_IV_PART_1",
            CanonicalWork::HenryIvPart2 => "HENRY_IV_PART_2",
            CanonicalWork::HenryV => "HENRY_V",
            CanonicalWork::HenryViPart1 => "HENRY_VI_PART_1",
            CanonicalWork::HenryViPart2 => "HENRY_VI_PART_2",
            CanonicalWork::HenryViPart3 => "HENRY_VI_PART_3",
            CanonicalWork::HenryViii => "HENRY_VIII",
            CanonicalWork::KingJohn => "KING_JOHN",
            CanonicalWork::RichardIi => "RICHARD_II",
            CanonicalWork::RichardIii => "RICHARD_III",
            CanonicalWork::AntonyAndCleopatra => "ANTONY_AND_CLEOPATRA",
            CanonicalWork::Coriolanus => "CORIOLANUS",
            CanonicalWork::Hamlet => "HAMLET",
            CanonicalWork::JuliusCaesar => "JULIUS_CAESAR",
            CanonicalWork::KingLear => "KING_LEAR",
            CanonicalWork::Macbeth => "MACBETH",
            CanonicalWork::Othello => "OTHELLO",
            CanonicalWork::RomeoAndJuliet => "ROMEO_AND_JULIET",
            CanonicalWork::TimonOfAthens => "TIMON_OF_ATHENS",
            CanonicalWork::TitusAndronicus => "TITUS_ANDRONICUS",
            CanonicalWork::TroilusAndCressida => "TROILUS_AND_CRESSIDA",
            CanonicalWork::Tempest => "TEMPEST",
            CanonicalWork::Other => "OTHER",
        }
    }

    /// Display title
    pub fn title(&self) -> &'static str {
        match self {
            CanonicalWork::AllsWellThatEndsWell => "All's Well That Ends Well",
            CanonicalWork::AsYouLikeIt => "As You Like It",
            CanonicalWork::ComedyOfErrors => "The Comedy of Errors",
            CanonicalWork::Cymbeline => "Cymbeline",
            CanonicalWork::LovesLaboursLost => "Love's Labour's Lost",
            CanonicalWork::MeasureForMeasure => "Measure for Measure",
            CanonicalWork::MerchantOfVenice => "The Merchant of Venice",
            CanonicalWork::MerryWivesOfWindsor => "The Merry Wives of Windsor",
            CanonicalWork::MidsummerNightsDream => "A Midsummer Night's Dream",
            CanonicalWork::MuchAdoAboutNothing => "Much Ado About Nothing",
            CanonicalWork::Pericles => "Pericles, Prince of Tyre",
            CanonicalWork::TamingOfTheShrew => "The Taming of the Shrew",
            CanonicalWork::TwelfthNight => "Twelfth Night",
            CanonicalWork::TwoGentlemenOfVerona => "The Two Gentlemen of Verona",
            CanonicalWork::WintersTale => "The Winter's Tale",
            CanonicalWork::HenryIvPart1 => "Henry IV, Part 1",
            CanonicalWork::HenryIvPart2 => "Henry IV, Part 2",
            CanonicalWork::HenryV => "Henry V",
            CanonicalWork::HenryViPart1 => "Henry VI, Part 1",
            CanonicalWork::HenryViPart2 => "Henry VI, Part 2",
            CanonicalWork::HenryViPart3 => "Henry VI, Part 3",
            CanonicalWork::HenryViii => "Henry VIII",
            CanonicalWork::KingJohn => "King John",
            CanonicalWork::RichardIi => "Richard II",
            CanonicalWork::RichardIii => "Richard III",
            CanonicalWork::AntonyAndCleopatra => "Antony and Cleopatra",
            CanonicalWork::Coriolanus => "Coriolanus",
            CanonicalWork::Hamlet => "Hamlet",
            CanonicalWork::JuliusCaesar => "Julius Caesar",
            CanonicalWork::KingLear => "King Lear",
            CanonicalWork::Macbeth => "Macbeth",
            CanonicalWork::Othello => "Othello",
            CanonicalWork::RomeoAndJuliet => "Romeo and Juliet",
            CanonicalWork::TimonOfAthens => "Timon of Athens",
            CanonicalWork::TitusAndronicus => "Titus Andronicus",
            CanonicalWork::TroilusAndCressida => "Troilus and Cressida",
            CanonicalWork::Tempest => "The Tempest",
            CanonicalWork::Other => "Other",
        }
    }

    pub fn category(&self) -> WorkCategory {
        use CanonicalWork::*;
        match self {
            Cymbeline | Pericles | WintersTale | Tempest => WorkCategory::Romance,
            AllsWellThatEndsWell | AsYouLikeIt | ComedyOfErrors | LovesLaboursLost
            | MeasureForMeasure | MerchantOfVenice | MerryWivesOfWindsor
            | MidsummerNightsDream | MuchAdoAboutNothing | TamingOfTheShrew | TwelfthNight
            | TwoGentlemenOfVerona => WorkCategory::Comedy,
            HenryIvPart1 | HenryIvPart2 | HenryV | HenryViPart1 | HenryViPart2 | HenryViPart3
            | HenryViii | KingJohn | RichardIi | RichardIii => WorkCategory::History,
            AntonyAndCleopatra | Coriolanus | Hamlet | JuliusCaesar | KingLear | Macbeth
            | Othello | RomeoAndJuliet | TimonOfAthens | TitusAndronicus
            | TroilusAndCressida => WorkCategory::Tragedy,
            Other => WorkCategory::Other,
        }
    }

    /// Position in [`CanonicalWork::ALL`]
    pub fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|w| w == self).unwrap_or(Self::ALL.len())
    }

    /// Works of one category, in enumeration order
    pub fn by_category(category: WorkCategory) -> Vec<CanonicalWork> {
        Self::ALL
            .iter()
            .copied()
            .filter(|w| w.category() == category)
            .collect()
    }

    pub fn is_other(&self) -> bool {
        matches!(self, CanonicalWork::Other)
    }
}

impl fmt::Display for CanonicalWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CanonicalWork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown canonical work: {}", s)))
    }
}

impl From<CanonicalWork> for &'static str {
    fn from(work: CanonicalWork) -> Self {
        work.code()
    }
}

impl TryFrom<String> for CanonicalWork {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for work in CanonicalWork::ALL {
            assert_eq!(work.code().parse::<CanonicalWork>().unwrap(), work);
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        assert!("KING_ARTHUR".parse::<CanonicalWork>().is_err());
    }

    #[test]
    fn test_categories() {
        assert_eq!(CanonicalWork::Hamlet.category(), WorkCategory::Tragedy);
        assert_eq!(CanonicalWork::Tempest.category(), WorkCategory::Romance);
        assert_eq!(CanonicalWork::Cymbeline.category(), WorkCategory::Romance);
        assert_eq!(CanonicalWork::RichardIii.category(), WorkCategory::History);
        assert_eq!(CanonicalWork::TwelfthNight.category(), WorkCategory::Comedy);
        assert_eq!(CanonicalWork::Other.category(), WorkCategory::Other);
    }

    #[test]
    fn test_enumeration_order_is_stable() {
        assert_eq!(CanonicalWork::ALL[0], CanonicalWork::AllsWellThatEndsWell);
        assert_eq!(CanonicalWork::ALL[37], CanonicalWork::Other);
        assert_eq!(CanonicalWork::Hamlet.ordinal(), 27);
        assert_eq!(CanonicalWork::by_category(WorkCategory::History).len(), 10);
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&CanonicalWork::RomeoAndJuliet).unwrap();
        assert_eq!(json, "\"ROMEO_AND_JULIET\"");
        let back: CanonicalWork = serde_json::from_str("\"MACBETH\"").unwrap();
        assert_eq!(back, CanonicalWork::Macbeth);
    }
}
