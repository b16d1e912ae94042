//! The byte pair merge step of BPE as byte-level CLIP tokenizers apply it: adjacent symbols are
//! merged pairwise, lowest merge rank first, until no adjacent pair has a rank.
use crate::vocab::HashMap;
use crate::Subword;

/// The merge table: for each adjacent pair of symbols that may be merged, the rank of that merge.
/// Lower ranks were learned earlier and are applied first.
#[derive(Clone, Debug, Default)]
pub struct MergeRanks(HashMap<Subword, HashMap<Subword, usize>>);

impl MergeRanks {
    /// Build the table from merges listed in rank order.
    pub fn new<Iter, A, B>(merges: Iter) -> Self
    where
        Iter: IntoIterator<Item = (A, B)>,
        A: Into<Subword>,
        B: Into<Subword>,
    {
        let mut table: HashMap<Subword, HashMap<Subword, usize>> = HashMap::default();
        for (rank, (left, right)) in merges.into_iter().enumerate() {
            table
                .entry(left.into())
                .or_default()
                .entry(right.into())
                .or_insert(rank);
        }

        Self(table)
    }

    pub fn rank(&self, left: &str, right: &str) -> Option<usize> {
        self.0.get(left)?.get(right).copied()
    }
}

/// Merge `parts` together into progressively fewer, longer symbols.
///
/// At each step the adjacent pair with the minimum rank is merged; ties go to the leftmost pair.
/// Since a merged symbol can only take part in merges learned after it, this produces the same
/// result as merging every occurrence of the best pair at once.
pub fn byte_pair_merge(mut parts: Vec<Subword>, ranks: &MergeRanks) -> Vec<Subword> {
    // usize::MAX is the sentinel for "this pair can't be merged"
    let get_rank = |parts: &[Subword], i: usize| {
        if i + 1 < parts.len() {
            ranks.rank(&parts[i], &parts[i + 1]).unwrap_or(usize::MAX)
        } else {
            usize::MAX
        }
    };

    // pair_ranks[i] is the rank of the pair starting at parts[i].  Look the ranks up once and
    // update only the neighbors of each merge.
    let mut pair_ranks: Vec<usize> = (0..parts.len()).map(|i| get_rank(&parts, i)).collect();

    // Words are short, so the O(mn) scan beats anything heap based
    while parts.len() > 1 {
        let mut min_rank: (usize, usize) = (usize::MAX, 0);
        for (i, &rank) in pair_ranks[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, i);
            }
        }

        if min_rank.0 == usize::MAX {
            break;
        }

        let i = min_rank.1;
        let right = parts.remove(i + 1);
        parts[i].push_str(&right);
        pair_ranks.remove(i + 1);

        pair_ranks[i] = get_rank(&parts, i);
        if i > 0 {
            pair_ranks[i - 1] = get_rank(&parts, i - 1);
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(items: &[&str]) -> Vec<Subword> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merges_lowest_rank_first() {
        let ranks = MergeRanks::new([("a", "t</w>"), ("c", "a"), ("ca", "t</w>")]);

        // (a, t</w>) outranks (c, a), so "cat" can never become a single symbol
        assert_eq!(
            symbols(&["c", "at</w>"]),
            byte_pair_merge(symbols(&["c", "a", "t</w>"]), &ranks)
        );
    }

    #[test]
    fn merges_repeat_until_no_ranked_pair() {
        let ranks = MergeRanks::new([("c", "a"), ("ca", "t</w>")]);

        assert_eq!(
            symbols(&["cat</w>"]),
            byte_pair_merge(symbols(&["c", "a", "t</w>"]), &ranks)
        );
    }

    #[test]
    fn repeated_pairs_merge_left_to_right() {
        let ranks = MergeRanks::new([("a", "a")]);

        assert_eq!(
            symbols(&["aa", "a</w>"]),
            byte_pair_merge(symbols(&["a", "a", "a</w>"]), &ranks)
        );
        assert_eq!(
            symbols(&["aa", "aa"]),
            byte_pair_merge(symbols(&["a", "a", "a", "a"]), &ranks)
        );
    }

    #[test]
    fn nothing_to_merge() {
        let ranks = MergeRanks::default();

        assert!(byte_pair_merge(Vec::new(), &ranks).is_empty());
        assert_eq!(
            symbols(&["x</w>"]),
            byte_pair_merge(symbols(&["x</w>"]), &ranks)
        );
    }
}
