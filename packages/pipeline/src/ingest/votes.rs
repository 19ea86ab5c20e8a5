//! Vote processing: tally vendor vote strings and derive an outcome.

use crate::models::{records::VoteRecord, VoteTally};

/// A tallied vote with its derived outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteResult {
    /// "passed", "failed", or "tie"; None when nothing countable was cast.
    pub outcome: Option<&'static str>,
    pub tally: VoteTally,
}

/// Tallies vendor vote records.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoteProcessor;

impl VoteProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, votes: &[VoteRecord]) -> VoteResult {
        let mut tally = VoteTally::default();

        for vote in votes {
            match normalize_vote(&vote.vote) {
                Some(NormalizedVote::Yes) => tally.yes += 1,
                Some(NormalizedVote::No) => tally.no += 1,
                Some(NormalizedVote::Abstain) => tally.abstain += 1,
                Some(NormalizedVote::Absent) => tally.absent += 1,
                Some(NormalizedVote::Recused) => tally.recused += 1,
                None => {}
            }
        }

        let outcome = if tally.yes == 0 && tally.no == 0 {
            None
        } else if tally.yes > tally.no {
            Some("passed")
        } else if tally.no > tally.yes {
            Some("failed")
        } else {
            Some("tie")
        };

        VoteResult { outcome, tally }
    }
}

enum NormalizedVote {
    Yes,
    No,
    Abstain,
    Absent,
    Recused,
}

fn normalize_vote(raw: &str) -> Option<NormalizedVote> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "aye" | "yea" | "in favor" | "approve" | "for" => Some(NormalizedVote::Yes),
        "no" | "nay" | "against" | "oppose" | "opposed" => Some(NormalizedVote::No),
        "abstain" | "abstained" | "abstention" => Some(NormalizedVote::Abstain),
        "absent" | "excused" | "not present" => Some(NormalizedVote::Absent),
        "recuse" | "recused" | "recusal" => Some(NormalizedVote::Recused),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(name: &str, value: &str) -> VoteRecord {
        VoteRecord {
            name: name.into(),
            vote: value.into(),
            sequence: None,
            metadata: None,
        }
    }

    #[test]
    fn majority_yes_passes() {
        let result = VoteProcessor::new().process(&[
            vote("Smith", "yes"),
            vote("Jones", "Aye"),
            vote("Lee", "no"),
        ]);
        assert_eq!(result.outcome, Some("passed"));
        assert_eq!(result.tally.yes, 2);
        assert_eq!(result.tally.no, 1);
    }

    #[test]
    fn majority_no_fails() {
        let result = VoteProcessor::new().process(&[
            vote("Smith", "nay"),
            vote("Jones", "against"),
            vote("Lee", "yea"),
        ]);
        assert_eq!(result.outcome, Some("failed"));
    }

    #[test]
    fn even_split_is_a_tie() {
        let result = VoteProcessor::new().process(&[vote("Smith", "yes"), vote("Jones", "no")]);
        assert_eq!(result.outcome, Some("tie"));
    }

    #[test]
    fn abstentions_do_not_decide() {
        let result = VoteProcessor::new().process(&[
            vote("Smith", "yes"),
            vote("Jones", "abstain"),
            vote("Lee", "abstain"),
        ]);
        assert_eq!(result.outcome, Some("passed"));
        assert_eq!(result.tally.abstain, 2);
    }

    #[test]
    fn no_countable_votes_means_no_outcome() {
        let result = VoteProcessor::new().process(&[
            vote("Smith", "absent"),
            vote("Jones", "recused"),
        ]);
        assert_eq!(result.outcome, None);
        assert_eq!(result.tally.absent, 1);
        assert_eq!(result.tally.recused, 1);
    }

    #[test]
    fn unrecognized_strings_are_ignored() {
        let result = VoteProcessor::new().process(&[vote("Smith", "present"), vote("Jones", "yes")]);
        assert_eq!(result.tally.yes, 1);
        assert_eq!(result.outcome, Some("passed"));
    }
}
