use once_cell::sync::Lazy;
use regex::Regex;

const LEFT_SINGLE_QUOTE: &str = "\u{2018}";
const RIGHT_SINGLE_QUOTE: &str = "\u{2019}";
const LEFT_DOUBLE_QUOTE: &str = "\u{201C}";
const RIGHT_DOUBLE_QUOTE: &str = "\u{201D}";

/// Runs of three alternating quotes that are directly followed by more text
static DOUBLE_SINGLE_DOUBLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"("'")(\S)"#).unwrap());
static SINGLE_DOUBLE_SINGLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"('"')(\S)"#).unwrap());

/// Melder state, can be saved and restored around out-of-line content such as notes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MelderSnapshot {
    in_double_quotes: bool,
    in_single_quotes: bool,
    double_quote_start: i64,
    single_quote_start: i64,
    previous_word: String,
    words_done: i64,
}

impl Default for MelderSnapshot {
    fn default() -> Self {
        Self {
            in_double_quotes: false,
            in_single_quotes: false,
            double_quote_start: -1,
            single_quote_start: -1,
            previous_word: String::new(),
            words_done: 0,
        }
    }
}

/// Decides where blanks go when consecutive words are joined into running text
#[derive(Clone, Debug, Default)]
pub struct SentenceMelder {
    state: MelderSnapshot,
    buffer: String,
}

impl SentenceMelder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state, the next word is treated as the first
    pub fn reset(&mut self) {
        self.state = MelderSnapshot::default();
    }

    pub fn save(&self) -> MelderSnapshot {
        self.state.clone()
    }

    pub fn restore(&mut self, snapshot: MelderSnapshot) {
        self.state = snapshot;
    }

    /// Whether a blank must precede `word`. Quote characters toggle the quotation state.
    pub fn should_output_blank(&mut self, word: &str, is_first_word: bool) -> bool {
        let mut result = false;
        let mut ending_punctuation = matches!(word, "?" | "!" | "." | "," | ";" | ":");
        let state = &mut self.state;

        if word == "\"" {
            state.in_double_quotes = !state.in_double_quotes;
            if state.in_double_quotes {
                result = state.previous_word != "'";
                state.double_quote_start = state.words_done;
            } else {
                //close badly nested single quotes
                if state.in_single_quotes && state.single_quote_start > state.double_quote_start {
                    state.single_quote_start = -1;
                    state.in_single_quotes = false;
                }
                state.double_quote_start = -1;
            }
            ending_punctuation = true;
        } else if word == "'" {
            state.in_single_quotes = !state.in_single_quotes;
            if state.in_single_quotes {
                result = state.previous_word != "\"";
                state.single_quote_start = state.words_done;
            } else {
                if state.in_double_quotes && state.double_quote_start > state.single_quote_start {
                    state.double_quote_start = -1;
                    state.in_double_quotes = false;
                }
                state.single_quote_start = -1;
            }
            ending_punctuation = true;
        }

        if is_first_word {
            return false;
        }
        if ending_punctuation {
            return result;
        }

        let previous = state.previous_word.as_str();
        let hugs_previous = (state.in_double_quotes && previous == "\"")
            || (state.in_single_quotes && previous == "'")
            || matches!(previous, "(" | "[" | "{")
            || previous == LEFT_DOUBLE_QUOTE
            || previous == LEFT_SINGLE_QUOTE
            || matches!(word, ")" | "]" | "}")
            || (word == "-" && previous == "-")
            || word == RIGHT_DOUBLE_QUOTE
            || word == RIGHT_SINGLE_QUOTE;
        !hugs_previous
    }

    /// Records `word` as the most recently output word
    pub fn process_word(&mut self, word: &str) {
        self.state.previous_word = word.to_owned();
        self.state.words_done += 1;
    }

    fn output_blank(&mut self) {
        self.buffer.push(' ');
    }

    /// Joins the words of a sentence into running text
    pub fn reconstitute_sentence<I, T>(&mut self, words: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.reset();
        self.buffer.clear();
        for (i, word) in words.into_iter().enumerate() {
            let word = word.as_ref();
            if self.should_output_blank(word, i == 0) {
                self.output_blank();
            }
            self.buffer.push_str(word);
            self.process_word(word);
        }
        let result = DOUBLE_SINGLE_DOUBLE_REGEX.replace_all(self.buffer.trim(), "${1} ${2}");
        let result = SINGLE_DOUBLE_SINGLE_REGEX
            .replace_all(&result, "${1} ${2}")
            .into_owned();
        self.buffer.clear();
        result
    }
}
