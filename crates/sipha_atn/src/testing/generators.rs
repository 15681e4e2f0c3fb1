//! # Sentence Generators
//!
//! Random sentences of a [`ParserGrammar`], for property tests that compare
//! prediction modes or check that valid input is always accepted.
//!
//! ```rust
//! use sipha_atn::testing::generators::{GeneratorConfig, SentenceGenerator};
//! use sipha_atn::testing::grammar::{Element, ParserGrammar};
//!
//! let grammar = ParserGrammar::new().rule(
//!     "s",
//!     vec![vec![Element::plus(vec![vec![Element::token(1)], vec![Element::token(2)]]), Element::eof()]],
//! );
//! let generator = SentenceGenerator::new(&grammar, GeneratorConfig { seed: Some(7), ..GeneratorConfig::default() });
//! let sentence = generator.generate(0);
//! assert_eq!(sentence.last(), Some(&-1));
//! assert_eq!(sentence, generator.generate(0));
//! ```
//!
//! Predicates and actions are ignored, and precedence suffixes are repeated
//! without regard to their levels. Past `max_depth` every choice takes the
//! alternative closest to a sentence without further rule calls, so generation
//! terminates for any grammar whose rules can all finish.

use super::grammar::{Element, ParserGrammar, RuleBody};

/// Configuration for sentence generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Rule nesting depth after which choices head for the shortest derivation
    pub max_depth: usize,
    /// Maximum number of iterations for `*` and `+` loops
    pub max_repetitions: usize,
    /// Probability of taking an optional block (0.0 to 1.0)
    pub optional_probability: f64,
    /// Seed for reproducible generation
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_repetitions: 5,
            optional_probability: 0.5,
            seed: None,
        }
    }
}

/// Generator for sentences of a parser grammar
pub struct SentenceGenerator<'g> {
    grammar: &'g ParserGrammar,
    config: GeneratorConfig,
    /// Minimum rule-call depth needed to finish each rule. `None` never finishes.
    heights: Vec<Option<usize>>,
    vocabulary_max: i32,
}

impl<'g> SentenceGenerator<'g> {
    #[must_use]
    pub fn new(grammar: &'g ParserGrammar, config: GeneratorConfig) -> Self {
        let mut generator = Self {
            grammar,
            config,
            heights: vec![None; grammar.rules().len()],
            vocabulary_max: grammar.vocabulary_max(),
        };
        generator.compute_heights();
        generator
    }

    /// Generate one sentence of rule `rule_index`. The same seed always yields the
    /// same sentence.
    #[must_use]
    pub fn generate(&self, rule_index: usize) -> Vec<i32> {
        let mut rng = self.rng();
        let mut sentence = Vec::new();
        self.expand_rule(rule_index, 0, &mut sentence, &mut rng);
        sentence
    }

    /// Generate `count` different draws from one random stream.
    #[must_use]
    pub fn generate_many(&self, rule_index: usize, count: usize) -> Vec<Vec<i32>> {
        let mut rng = self.rng();
        (0..count)
            .map(|_| {
                let mut sentence = Vec::new();
                self.expand_rule(rule_index, 0, &mut sentence, &mut rng);
                sentence
            })
            .collect()
    }

    /// Generate a sentence and damage it with `mutations` random edits. The result
    /// is usually not in the language.
    #[must_use]
    pub fn generate_mutated(&self, rule_index: usize, mutations: usize) -> Vec<i32> {
        let mut rng = self.rng();
        let mut sentence = Vec::new();
        self.expand_rule(rule_index, 0, &mut sentence, &mut rng);
        for _ in 0..mutations {
            if sentence.is_empty() {
                break;
            }
            let idx = rng.below(sentence.len());
            match rng.below(4) {
                0 => {
                    sentence.remove(idx);
                }
                1 => sentence.insert(idx, self.random_symbol(&mut rng)),
                2 => sentence[idx] = self.random_symbol(&mut rng),
                _ => {
                    let other = rng.below(sentence.len());
                    sentence.swap(idx, other);
                }
            }
        }
        sentence
    }

    fn rng(&self) -> SimpleRng {
        self.config.seed.map_or_else(SimpleRng::new, SimpleRng::with_seed)
    }

    fn random_symbol(&self, rng: &mut SimpleRng) -> i32 {
        1 + rng.below(self.vocabulary_max.max(1) as usize) as i32
    }

    fn compute_heights(&mut self) {
        for _ in 0..=self.heights.len() {
            let mut changed = false;
            for (index, rule) in self.grammar.rules().iter().enumerate() {
                let primary = match &rule.body {
                    RuleBody::Alternatives(alts) => alts,
                    RuleBody::Precedence { primary, .. } => primary,
                };
                let height = self.alts_height(primary);
                if height != self.heights[index] {
                    self.heights[index] = height;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn alts_height(&self, alts: &[Vec<Element>]) -> Option<usize> {
        alts.iter().filter_map(|alt| self.alt_height(alt)).min()
    }

    fn alt_height(&self, alt: &[Element]) -> Option<usize> {
        alt.iter().try_fold(0, |acc, e| Some(acc.max(self.element_height(e)?)))
    }

    fn element_height(&self, element: &Element) -> Option<usize> {
        match element {
            Element::Rule { name, .. } => {
                let callee = self.grammar.rule_index(name)?;
                Some(self.heights[callee]? + 1)
            }
            Element::Block(alts) | Element::Plus { alts, .. } => self.alts_height(alts),
            _ => Some(0),
        }
    }

    /// Picks an alternative: at random while shallow, the shortest one past the
    /// depth limit.
    fn choose<'a>(&self, alts: &'a [Vec<Element>], depth: usize, rng: &mut SimpleRng) -> Option<&'a [Element]> {
        if alts.is_empty() {
            return None;
        }
        if depth < self.config.max_depth {
            return Some(&alts[rng.below(alts.len())]);
        }
        alts.iter()
            .min_by_key(|alt| self.alt_height(alt).unwrap_or(usize::MAX))
            .map(Vec::as_slice)
    }

    fn repetitions(&self, min: usize, depth: usize, rng: &mut SimpleRng) -> usize {
        let max = self.config.max_repetitions.max(min);
        if depth >= self.config.max_depth || max == min {
            min
        } else {
            min + rng.below(max - min + 1)
        }
    }

    fn expand_rule(&self, rule_index: usize, depth: usize, out: &mut Vec<i32>, rng: &mut SimpleRng) {
        let Some(rule) = self.grammar.rules().get(rule_index) else {
            return;
        };
        match &rule.body {
            RuleBody::Alternatives(alts) => {
                if let Some(alt) = self.choose(alts, depth, rng) {
                    self.expand_sequence(alt, depth, out, rng);
                }
            }
            RuleBody::Precedence { primary, suffixes } => {
                if let Some(alt) = self.choose(primary, depth, rng) {
                    self.expand_sequence(alt, depth, out, rng);
                }
                if suffixes.is_empty() {
                    return;
                }
                for _ in 0..self.repetitions(0, depth, rng) {
                    let (_, suffix) = &suffixes[rng.below(suffixes.len())];
                    self.expand_sequence(suffix, depth, out, rng);
                }
            }
        }
    }

    fn expand_sequence(&self, elements: &[Element], depth: usize, out: &mut Vec<i32>, rng: &mut SimpleRng) {
        for element in elements {
            self.expand(element, depth, out, rng);
        }
    }

    fn expand(&self, element: &Element, depth: usize, out: &mut Vec<i32>, rng: &mut SimpleRng) {
        match element {
            Element::Atom(t) => out.push(*t),
            Element::Range(start, stop) => {
                let span = (stop - start).max(0) as usize + 1;
                out.push(start + rng.below(span) as i32);
            }
            Element::Set(set) => {
                if let Some(symbol) = set.iter().nth(rng.below(set.len().max(1))) {
                    out.push(symbol);
                }
            }
            Element::NotSet(set) => {
                if let Some(symbol) = (1..=self.vocabulary_max).find(|s| !set.contains(*s)) {
                    out.push(symbol);
                }
            }
            Element::Wildcard => out.push(self.random_symbol(rng)),
            Element::Text(text) => out.extend(text.chars().map(|c| c as i32)),
            Element::Rule { name, .. } => {
                if let Some(callee) = self.grammar.rule_index(name) {
                    self.expand_rule(callee, depth + 1, out, rng);
                }
            }
            Element::Predicate { .. } | Element::Precedence(_) | Element::Action(_) | Element::Command(_) => {}
            Element::Block(alts) => {
                if let Some(alt) = self.choose(alts, depth, rng) {
                    self.expand_sequence(alt, depth, out, rng);
                }
            }
            Element::Optional { alts, .. } => {
                if depth < self.config.max_depth && rng.next_f64() < self.config.optional_probability {
                    if let Some(alt) = self.choose(alts, depth, rng) {
                        self.expand_sequence(alt, depth, out, rng);
                    }
                }
            }
            Element::Star { alts, .. } => {
                for _ in 0..self.repetitions(0, depth, rng) {
                    if let Some(alt) = self.choose(alts, depth, rng) {
                        self.expand_sequence(alt, depth, out, rng);
                    }
                }
            }
            Element::Plus { alts, .. } => {
                for _ in 0..self.repetitions(1, depth, rng) {
                    if let Some(alt) = self.choose(alts, depth, rng) {
                        self.expand_sequence(alt, depth, out, rng);
                    }
                }
            }
        }
    }
}

/// Simple RNG for deterministic testing
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new() -> Self {
        Self {
            state: 0x853c_49e6_748f_ea9b,
        }
    }

    fn with_seed(seed: u64) -> Self {
        // xorshift is stuck at zero
        if seed == 0 {
            Self::new()
        } else {
            Self { state: seed }
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            0
        } else {
            (self.next_u64() % bound as u64) as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = SimpleRng::with_seed(12345);
        let mut rng2 = SimpleRng::with_seed(12345);
        assert_eq!(rng1.next_u64(), rng2.next_u64());
        assert_ne!(rng1.next_u64(), rng1.next_u64());
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = SimpleRng::with_seed(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn test_recursive_rule_terminates() {
        // s : '(' s ')' | 'x' ;
        let grammar = ParserGrammar::new().rule(
            "s",
            vec![
                vec![Element::token(1), Element::rule("s"), Element::token(2)],
                vec![Element::token(3)],
            ],
        );
        let config = GeneratorConfig {
            max_depth: 4,
            ..GeneratorConfig::default()
        };
        let generator = SentenceGenerator::new(&grammar, config);
        for sentence in generator.generate_many(0, 50) {
            let opens = sentence.iter().filter(|&&t| t == 1).count();
            let closes = sentence.iter().filter(|&&t| t == 2).count();
            assert_eq!(opens, closes);
            assert!(opens <= 4);
            assert_eq!(sentence.iter().filter(|&&t| t == 3).count(), 1);
        }
    }

    #[test]
    fn test_unfinishable_rule_has_no_height() {
        let grammar = ParserGrammar::new()
            .rule("s", vec![vec![Element::token(1)]])
            .rule("loop", vec![vec![Element::token(1), Element::rule("loop")]]);
        let generator = SentenceGenerator::new(&grammar, GeneratorConfig::default());
        assert_eq!(generator.heights, vec![Some(0), None]);
    }

    #[test]
    fn test_zero_mutations_keep_sentence() {
        let grammar = ParserGrammar::new().rule(
            "s",
            vec![vec![Element::token(1), Element::token(2), Element::token(3), Element::token(4)]],
        );
        let config = GeneratorConfig {
            seed: Some(99),
            ..GeneratorConfig::default()
        };
        let generator = SentenceGenerator::new(&grammar, config);
        assert_eq!(generator.generate(0), vec![1, 2, 3, 4]);
        assert_eq!(generator.generate_mutated(0, 0), vec![1, 2, 3, 4]);
    }
}
