//! Learner and lesson profiles
//!
//! Stores hand back `*Record` values whose numeric fields may be missing,
//! the way nullable columns come out of a database. `resolve` turns a record
//! into a fully-populated, clamped `*Profile` once, at load time, so the
//! engine never re-derives defaults.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

pub type LearnerId = i64;
pub type LessonId = i64;

/// The three tracked language skills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Grammar,
    Vocab,
    Listening,
}

impl Skill {
    pub const ALL: [Skill; 3] = [Skill::Grammar, Skill::Vocab, Skill::Listening];
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Skill::Grammar => "grammar",
            Skill::Vocab => "vocab",
            Skill::Listening => "listening",
        };
        f.pad(name)
    }
}

/// Clamp to [0, 1]; NaN collapses to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One value per skill, used both for learner proficiency and lesson weights
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkillLevels {
    pub grammar: f64,
    pub vocab: f64,
    pub listening: f64,
}

impl SkillLevels {
    pub const fn new(grammar: f64, vocab: f64, listening: f64) -> Self {
        Self { grammar, vocab, listening }
    }

    pub fn get(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Grammar => self.grammar,
            Skill::Vocab => self.vocab,
            Skill::Listening => self.listening,
        }
    }

    pub fn set(&mut self, skill: Skill, value: f64) {
        match skill {
            Skill::Grammar => self.grammar = value,
            Skill::Vocab => self.vocab = value,
            Skill::Listening => self.listening = value,
        }
    }

    /// Apply `f` to every skill
    pub fn map(&self, mut f: impl FnMut(Skill, f64) -> f64) -> Self {
        let mut out = *self;
        for skill in Skill::ALL {
            out.set(skill, f(skill, self.get(skill)));
        }
        out
    }

    pub fn clamped(&self) -> Self {
        self.map(|_, v| clamp_unit(v))
    }

    /// Per-skill difference `self - earlier`
    pub fn delta_from(&self, earlier: &SkillLevels) -> Self {
        self.map(|skill, v| v - earlier.get(skill))
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.grammar, self.vocab, self.listening]
    }
}

/// Learner row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerRecord {
    pub id: LearnerId,
    pub name: String,
    pub rating: Option<i32>,
    pub grammar_proficiency: Option<f64>,
    pub vocab_proficiency: Option<f64>,
    pub listening_proficiency: Option<f64>,
    /// Bumped on every write, checked on outcome commits
    pub version: i64,
}

impl LearnerRecord {
    /// A not-yet-inserted learner with nothing but a name
    pub fn draft(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            rating: None,
            grammar_proficiency: None,
            vocab_proficiency: None,
            listening_proficiency: None,
            version: 0,
        }
    }

    /// Fill missing values from `config` and clamp everything into range
    pub fn resolve(&self, config: &EngineConfig) -> LearnerProfile {
        let fallback = config.default_proficiency;
        LearnerProfile {
            id: self.id,
            name: self.name.clone(),
            rating: self.rating.unwrap_or(config.baseline_rating).max(0),
            proficiency: SkillLevels::new(
                self.grammar_proficiency.unwrap_or(fallback),
                self.vocab_proficiency.unwrap_or(fallback),
                self.listening_proficiency.unwrap_or(fallback),
            )
            .clamped(),
            version: self.version,
        }
    }
}

/// Learner with every field populated and clamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: LearnerId,
    pub name: String,
    pub rating: i32,
    pub proficiency: SkillLevels,
    pub version: i64,
}

/// Lesson row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: LessonId,
    pub name: String,
    pub difficulty_rating: Option<i32>,
    pub grammar_weight: Option<f64>,
    pub vocab_weight: Option<f64>,
    pub listening_weight: Option<f64>,
    pub active: bool,
    pub version: i64,
}

impl LessonRecord {
    /// A not-yet-inserted active lesson with default weights and difficulty
    pub fn draft(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            difficulty_rating: None,
            grammar_weight: None,
            vocab_weight: None,
            listening_weight: None,
            active: true,
            version: 0,
        }
    }

    pub fn resolve(&self, config: &EngineConfig) -> LessonProfile {
        let defaults = config.default_weights;
        LessonProfile {
            id: self.id,
            name: self.name.clone(),
            difficulty_rating: self.difficulty_rating.unwrap_or(config.baseline_rating).max(0),
            weights: SkillLevels::new(
                self.grammar_weight.unwrap_or(defaults.grammar),
                self.vocab_weight.unwrap_or(defaults.vocab),
                self.listening_weight.unwrap_or(defaults.listening),
            )
            .clamped(),
            active: self.active,
            version: self.version,
        }
    }
}

/// Lesson with every field populated and clamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProfile {
    pub id: LessonId,
    pub name: String,
    pub difficulty_rating: i32,
    pub weights: SkillLevels,
    pub active: bool,
    pub version: i64,
}
