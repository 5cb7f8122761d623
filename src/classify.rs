use std::collections::{HashMap, HashSet};

use crate::config::{AdornConfig, TagClass};

/// Classifies tag names as soft, jump or hard tags.
///
/// Soft tags (emphasis, line breaks) do not interrupt a sentence. Jump tags
/// (notes) interrupt it, but the sentence resumes after them. All other
/// tags are hard and end whatever sentence is in progress.
#[derive(Debug, Clone, Default)]
pub struct TagClassifier {
    soft: HashSet<String>,
    jump: HashSet<String>,
    classes: HashMap<String, TagClass>,
    word_tag: String,
    char_tag: String,
}

impl TagClassifier {
    pub fn new(config: &AdornConfig) -> Self {
        Self {
            soft: config.soft_tags.iter().map(|s| s.to_lowercase()).collect(),
            jump: config.jump_tags.iter().map(|s| s.to_lowercase()).collect(),
            classes: config
                .tag_classes
                .iter()
                .map(|(tag, class)| (tag.to_lowercase(), *class))
                .collect(),
            word_tag: config.word_tag.clone(),
            char_tag: config.char_tag.clone(),
        }
    }

    fn contains(set: &HashSet<String>, name: &str) -> bool {
        set.contains(name) || set.contains(&name.to_lowercase())
    }

    pub fn is_soft(&self, name: &str) -> bool {
        Self::contains(&self.soft, name)
    }

    pub fn is_jump(&self, name: &str) -> bool {
        Self::contains(&self.jump, name)
    }

    pub fn is_hard(&self, name: &str) -> bool {
        !self.is_soft(name) && !self.is_jump(name)
    }

    pub fn is_word(&self, name: &str) -> bool {
        name == self.word_tag
    }

    pub fn is_char(&self, name: &str) -> bool {
        name == self.char_tag
    }

    pub fn tag_class(&self, name: &str) -> Option<TagClass> {
        self.classes
            .get(name)
            .or_else(|| self.classes.get(&name.to_lowercase()))
            .copied()
    }

    pub fn word_tag(&self) -> &str {
        &self.word_tag
    }

    pub fn char_tag(&self) -> &str {
        &self.char_tag
    }
}
