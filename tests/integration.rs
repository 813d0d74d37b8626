use std::collections::{HashMap, HashSet};

use indoc::indoc;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use strand_tree::{longest_common_strand, SuffixTree, TreeBuilder};

fn build(inputs: &[&[u8]]) -> SuffixTree {
    SuffixTree::from_sequences(inputs).unwrap()
}

fn starts(tree: &SuffixTree) -> Option<(usize, Vec<(usize, usize)>)> {
    tree.longest_common().map(|(length, occurrences)| {
        let mut resolved: Vec<(usize, usize)> = occurrences
            .into_iter()
            .map(|(k, offset)| (k, (tree.input_len(k) as isize + offset) as usize))
            .collect();
        resolved.sort();
        (length, resolved)
    })
}

#[test]
fn build_suffix_tree() {
    let _ = build(&[b"test", b"builder", b"asdfkljasdlf"]);
}

#[test]
fn pretty_print() {
    let expected = indoc!(
        "┳est┳$0
         ┃   ┗$1
         ┣rest$1
         ┣st┳$0
         ┃  ┗$1
         ┣t┳est$0
         ┃ ┣$0
         ┃ ┗$1
         ┣$0
         ┗$1"
    );

    let tree = build(&[b"test", b"rest"]);

    assert_eq!(tree.pretty_print(), expected);
}

#[test]
fn overlapping_runs_of_bytes() {
    let tree = build(&[&[1, 2, 3], &[2, 3, 4]]);
    assert_eq!(starts(&tree), Some((2, vec![(0, 1), (1, 0)])));
}

#[test]
fn identical_inputs_share_everything() {
    let tree = build(&[&[0, 0, 0, 0], &[0, 0, 0, 0]]);
    assert_eq!(starts(&tree), Some((4, vec![(0, 0), (1, 0)])));
}

#[test]
fn disjoint_alphabets_share_nothing() {
    let tree = build(&[&[5, 6, 7], &[8, 9]]);
    assert_eq!(tree.longest_common(), None);
}

#[test]
fn strand_present_in_all_three_inputs() {
    let tree = build(&[&[1, 2, 3, 4, 5], &[3, 4, 5, 6, 7], &[9, 3, 4, 5, 0]]);
    assert_eq!(starts(&tree), Some((3, vec![(0, 2), (1, 0), (2, 1)])));
}

#[test]
fn empty_input_contributes_nothing() {
    let tree = build(&[&[], &[1, 2]]);
    assert_eq!(tree.longest_common(), None);
}

#[test]
fn single_input_has_no_common_strand() {
    let tree = build(&[b"abcabcabc"]);
    assert_eq!(tree.longest_common(), None);
}

#[test]
fn no_inputs_at_all() {
    let tree = TreeBuilder::new().build().unwrap();
    assert_eq!(tree.input_count(), 0);
    assert_eq!(tree.longest_common(), None);
}

#[test]
fn permuting_inputs_permutes_the_report() {
    let tree = build(&[&[2, 3, 4], &[1, 2, 3]]);
    assert_eq!(starts(&tree), Some((2, vec![(0, 0), (1, 1)])));
}

#[test]
fn lcs_of_ascii_strings() {
    let strand = longest_common_strand(&[b"testing", b"festung", b"estland"]).unwrap();
    assert_eq!(strand.unwrap(), b"est");
}

struct XorShift(u64);

impl XorShift {
    fn byte(&mut self) -> u8 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 32) as u8
    }

    fn fill(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.byte()).collect()
    }
}

/// The ten-file reference scenario: deterministic noise with a 27648-byte
/// strand planted as a suffix of the second and third files.
#[test]
fn reference_scenario_with_planted_strand() {
    const LENGTHS: [usize; 10] = [
        17408, 30720, 45056, 30720, 23552, 27648, 21504, 20480, 13312, 14336,
    ];
    const STRAND_LEN: usize = 27648;

    let mut files: Vec<Vec<u8>> = LENGTHS
        .iter()
        .enumerate()
        .map(|(k, &len)| XorShift(0x9E37_79B9_7F4A_7C15 ^ (k as u64 + 1)).fill(len))
        .collect();

    let strand = XorShift(0xD1B5_4A32_D192_ED03).fill(STRAND_LEN);
    files[1][3072..].copy_from_slice(&strand);
    files[2][17408..].copy_from_slice(&strand);
    // Pin the bytes just before the planted copies so the match cannot
    // extend to the left.
    files[1][3071] = 0xaa;
    files[2][17407] = 0x55;

    let inputs: Vec<&[u8]> = files.iter().map(|f| f.as_slice()).collect();
    let tree = SuffixTree::from_sequences(&inputs).unwrap();

    let (length, mut occurrences) = tree.longest_common().unwrap();
    occurrences.sort();
    assert_eq!(length, STRAND_LEN);
    assert_eq!(occurrences, vec![(1, -27648), (2, -27648)]);

    let resolved = starts(&tree).unwrap();
    assert_eq!(resolved, (STRAND_LEN, vec![(1, 3072), (2, 17408)]));
}

/// Longest substring present in at least two inputs, the slow way.
fn naive_longest_common(inputs: &[&[u8]]) -> usize {
    let mut membership: HashMap<&[u8], HashSet<usize>> = HashMap::new();
    for (k, input) in inputs.iter().enumerate() {
        for i in 0..input.len() {
            for j in (i + 1)..=input.len() {
                membership.entry(&input[i..j]).or_default().insert(k);
            }
        }
    }
    membership
        .iter()
        .filter(|(_, ks)| ks.len() >= 2)
        .map(|(s, _)| s.len())
        .max()
        .unwrap_or(0)
}

/// A handful of short inputs over a four-byte alphabet, small enough for
/// the naive oracle but collision-heavy enough to be interesting.
#[derive(Debug, Clone)]
struct SmallInputs(Vec<Vec<u8>>);

impl Arbitrary for SmallInputs {
    fn arbitrary(g: &mut Gen) -> SmallInputs {
        let count = usize::arbitrary(g) % 4 + 1;
        let inputs = (0..count)
            .map(|_| {
                let len = usize::arbitrary(g) % 12;
                (0..len).map(|_| u8::arbitrary(g) % 4).collect()
            })
            .collect();
        SmallInputs(inputs)
    }
}

#[quickcheck]
fn query_agrees_with_the_naive_oracle(inputs: SmallInputs) -> bool {
    let slices: Vec<&[u8]> = inputs.0.iter().map(|v| v.as_slice()).collect();
    let tree = SuffixTree::from_sequences(&slices).unwrap();

    match tree.longest_common() {
        None => naive_longest_common(&slices) == 0,
        Some((length, occurrences)) => {
            if length == 0 || occurrences.len() < 2 {
                return false;
            }
            if naive_longest_common(&slices) != length {
                return false;
            }
            let distinct: HashSet<usize> = occurrences.iter().map(|&(k, _)| k).collect();
            if distinct.len() != occurrences.len() {
                return false;
            }
            let resolve = |k: usize, offset: isize| -> Vec<u8> {
                let start = (slices[k].len() as isize + offset) as usize;
                slices[k][start..start + length].to_vec()
            };
            let witness = resolve(occurrences[0].0, occurrences[0].1);
            occurrences.iter().all(|&(k, offset)| resolve(k, offset) == witness)
        }
    }
}

#[quickcheck]
fn reversing_the_inputs_preserves_the_length(inputs: SmallInputs) -> bool {
    let slices: Vec<&[u8]> = inputs.0.iter().map(|v| v.as_slice()).collect();
    let mut reversed = slices.clone();
    reversed.reverse();

    let length = |inputs: &[&[u8]]| {
        SuffixTree::from_sequences(inputs)
            .unwrap()
            .longest_common()
            .map(|(length, _)| length)
            .unwrap_or(0)
    };

    length(&slices) == length(&reversed)
}
