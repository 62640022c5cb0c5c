/// The caller's response language.
///
/// Decided exactly once, from the first collected digit, and threaded
/// through every subsequent prompt name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// Primary locale, sound segment `he`.
    Hebrew,
    /// Secondary locale, sound segment `en`.
    English,
}

impl Language {
    /// Digit `2` selects English; any other input keeps the default Hebrew.
    pub fn from_digit(digit: &str) -> Self {
        if digit == "2" {
            Language::English
        } else {
            Language::Hebrew
        }
    }

    pub fn segment(&self) -> &'static str {
        match self {
            Language::Hebrew => "he",
            Language::English => "en",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Hebrew
    }
}

/// One prompt of the dialogue, identified by its step name inside the
/// sound-resource tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Language,
    District,
    Category,
    Gender,
    Ordering,
    Results,
    Worker1,
    Worker2,
}

impl Prompt {
    fn step(&self) -> &'static str {
        match self {
            Prompt::Language => "language",
            Prompt::District => "district",
            Prompt::Category => "category",
            Prompt::Gender => "gender",
            Prompt::Ordering => "ordering",
            Prompt::Results => "result",
            Prompt::Worker1 => "worker1",
            Prompt::Worker2 => "worker2",
        }
    }

    /// Build the hierarchical sound-resource name for this prompt.
    ///
    /// The language-selection prompt is played before a language exists and
    /// carries no locale segment.
    pub fn sound_name(&self, prefix: &str, language: Language) -> String {
        match self {
            Prompt::Language => format!("{}/{}", prefix, self.step()),
            _ => format!("{}/{}/{}", prefix, language.segment(), self.step()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_digit() {
        assert_eq!(Language::from_digit("2"), Language::English);
        assert_eq!(Language::from_digit("1"), Language::Hebrew);
        assert_eq!(Language::from_digit("9"), Language::Hebrew);
        assert_eq!(Language::from_digit("#"), Language::Hebrew);
        assert_eq!(Language::from_digit(""), Language::Hebrew);
    }

    #[test]
    fn test_sound_names() {
        assert_eq!(
            Prompt::District.sound_name("custom", Language::English),
            "custom/en/district"
        );
        assert_eq!(
            Prompt::District.sound_name("custom", Language::Hebrew),
            "custom/he/district"
        );
        assert_eq!(
            Prompt::Worker2.sound_name("custom", Language::Hebrew),
            "custom/he/worker2"
        );
        // The language prompt has no locale segment.
        assert_eq!(
            Prompt::Language.sound_name("custom", Language::Hebrew),
            "custom/language"
        );
        assert_eq!(
            Prompt::Language.sound_name("custom", Language::English),
            "custom/language"
        );
    }
}
