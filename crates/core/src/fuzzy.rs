//! Token-level approximate string matching for product and entity lookup.
//!
//! Scores live in [0, 100]. A case/space-insensitive exact match is the only
//! way to score 100; everything else caps at 99 so a verbatim candidate
//! always outranks near misses. Partial (windowed) scoring means a candidate
//! fully contained in the query is never punished for the surrounding words.

/// Default acceptance cutoff. Callers treat sub-threshold results as
/// "no match" rather than silently taking the best of bad options.
pub const DEFAULT_THRESHOLD: u8 = 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedMatch {
    /// Position of the candidate in the caller's input order.
    pub index: usize,
    pub candidate: String,
    pub score: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct FuzzyMatcher {
    threshold: u8,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Similarity of `query` and `candidate` in [0, 100].
    pub fn score(&self, query: &str, candidate: &str) -> u8 {
        let query_chars = match_chars(query);
        let candidate_chars = match_chars(candidate);

        if query_chars.is_empty() || candidate_chars.is_empty() {
            return 0;
        }
        if query_chars == candidate_chars {
            return 100;
        }

        let full = ratio(&query_chars, &candidate_chars);
        let partial = partial_ratio(&query_chars, &candidate_chars);
        full.max(partial).min(99)
    }

    /// All candidates scored and sorted descending. Equal scores keep the
    /// caller's input order (stable).
    pub fn rank<'a, I>(&self, query: &str, candidates: I) -> Vec<RankedMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ranked = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| RankedMatch {
                index,
                candidate: candidate.to_string(),
                score: self.score(query, candidate),
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    /// The top candidate at or above the acceptance threshold, if any.
    pub fn best<'a, I>(&self, query: &str, candidates: I) -> Option<RankedMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(query, candidates).into_iter().next().filter(|m| m.score >= self.threshold)
    }
}

/// Lower-cased alphanumeric characters with single spaces between words.
fn match_chars(text: &str) -> Vec<char> {
    let mut chars = Vec::with_capacity(text.len());
    let mut pending_space = false;
    for character in text.to_lowercase().chars() {
        if character.is_alphanumeric() {
            if pending_space && !chars.is_empty() {
                chars.push(' ');
            }
            pending_space = false;
            chars.push(character);
        } else {
            pending_space = true;
        }
    }
    chars
}

fn ratio(a: &[char], b: &[char]) -> u8 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0;
    }
    let distance = edit_distance(a, b);
    ((100.0 * (longest - distance.min(longest)) as f64) / longest as f64).round() as u8
}

/// Best ratio of the shorter string against any equal-length window of the
/// longer one. Full containment therefore scores as an exact window hit.
fn partial_ratio(a: &[char], b: &[char]) -> u8 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.len() == long.len() {
        return ratio(short, long);
    }

    let mut best = 0;
    for start in 0..=(long.len() - short.len()) {
        let window = &long[start..start + short.len()];
        best = best.max(ratio(short, window));
        if best == 100 {
            break;
        }
    }
    best
}

/// Damerau-Levenshtein distance: insertions, deletions, substitutions, and
/// adjacent transpositions all cost one.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        table[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            table[i][j] = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + cost);

            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                table[i][j] = table[i][j].min(table[i - 2][j - 2] + cost);
            }
        }
    }

    table[a.len()][b.len()]
}

#[cfg(test)]
mod tests {
    use super::{FuzzyMatcher, DEFAULT_THRESHOLD};

    fn matcher() -> FuzzyMatcher {
        FuzzyMatcher::new(DEFAULT_THRESHOLD)
    }

    #[test]
    fn verbatim_candidate_scores_100_and_ranks_first() {
        let candidates = ["Bamboo Bottle Deluxe", "Bamboo Bottle", "Steel Bottle"];
        let ranked = matcher().rank("Bamboo Bottle", candidates);

        assert_eq!(ranked[0].candidate, "Bamboo Bottle");
        assert_eq!(ranked[0].score, 100);
        assert!(ranked[1].score < 100);
    }

    #[test]
    fn exact_match_is_case_and_space_insensitive() {
        assert_eq!(matcher().score("bamboo  bottle", "Bamboo Bottle"), 100);
        assert_eq!(matcher().score("BAMBOO-BOTTLE", "bamboo bottle"), 100);
    }

    #[test]
    fn transposition_scores_are_symmetric() {
        let m = matcher();
        assert_eq!(m.score("recieve", "receive"), m.score("receive", "recieve"));
        assert_eq!(m.score("bambo", "bamob"), m.score("bamob", "bambo"));
    }

    #[test]
    fn tolerates_missing_and_extra_characters() {
        let m = matcher();
        assert!(m.score("bambo botle", "Bamboo Bottle") >= DEFAULT_THRESHOLD);
        assert!(m.score("bambooo bottle", "Bamboo Bottle") >= DEFAULT_THRESHOLD);
    }

    #[test]
    fn contained_candidate_dominates_surrounding_words() {
        let m = matcher();
        let contained = m.score("add a bamboo bottle to my cart", "Bamboo Bottle");
        assert!(contained >= 90, "containment should score high, got {contained}");

        let non_contained = m.score("bamboo kettle", "Bamboo Bottle");
        assert!(contained >= non_contained);
    }

    #[test]
    fn equal_scores_preserve_input_order() {
        let ranked = matcher().rank("straw", ["Bamboo Straw", "Burlap Straw"]);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[0].candidate, "Bamboo Straw");
    }

    #[test]
    fn best_rejects_sub_threshold_matches() {
        let m = matcher();
        assert!(m.best("xylophone", ["Bamboo Bottle", "Jute Tote Bag"]).is_none());

        let hit = m.best("bamboo botle", ["Bamboo Bottle", "Jute Tote Bag"]);
        assert_eq!(hit.map(|m| m.candidate).as_deref(), Some("Bamboo Bottle"));
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(matcher().score("", "Bamboo Bottle"), 0);
        assert_eq!(matcher().score("bottle", ""), 0);
    }
}
