//! Formulaic bracket addressing: where winners and losers go, and what feeds a node.
//!
//! Nothing here touches storage. Every function is total: addresses outside the bracket
//! yield `None` or an empty list instead of panicking.

use crate::models::{BracketFormat, BracketSide, EngineError, NodeAddress, SlotPosition};

/// Whether a feeder sends its winner or its loser.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Feed {
    Winner,
    Loser,
}

/// Where a competitor leaving a node goes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Destination {
    pub node: NodeAddress,
    pub position: SlotPosition,
}

/// One predecessor of a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Feeder {
    pub from: NodeAddress,
    pub feed: Feed,
    /// Slot of the fed node this feeder fills.
    pub position: SlotPosition,
}

fn half_up(slot: u32) -> u32 {
    slot.div_ceil(2)
}

/// Round structure of a power-of-two bracket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BracketShape {
    pub format: BracketFormat,
    pub size: u32,
    /// Winners-side rounds before the grand final.
    pub winners_rounds: u32,
}

impl BracketShape {
    /// Double elimination needs at least 4 entrants, single elimination at least 4 as well
    /// (its final is the grand final, so 2 entrants would leave no winners rounds).
    pub fn new(format: BracketFormat, size: usize) -> Result<Self, EngineError> {
        if size < 4 || !size.is_power_of_two() || size > u32::MAX as usize {
            return Err(EngineError::InvalidBracketSize(size));
        }
        let log2 = size.trailing_zeros();
        let winners_rounds = match format {
            BracketFormat::DoubleElimination => log2,
            BracketFormat::SingleElimination => log2 - 1,
        };
        Ok(Self {
            format,
            size: size as u32,
            winners_rounds,
        })
    }

    pub fn losers_rounds(&self) -> u32 {
        match self.format {
            BracketFormat::DoubleElimination => 2 * (self.winners_rounds - 1),
            BracketFormat::SingleElimination => 0,
        }
    }

    /// Last round number of `side` (0 for sides this format does not have).
    pub fn rounds(&self, side: BracketSide) -> u32 {
        match side {
            BracketSide::Winners => self.winners_rounds,
            BracketSide::Losers => self.losers_rounds(),
            BracketSide::GrandFinal => 1,
            BracketSide::None => 0,
        }
    }

    /// Node count of a round (0 outside the bracket).
    pub fn matches_in_round(&self, side: BracketSide, round: u32) -> u32 {
        if round == 0 || round > self.rounds(side) {
            return 0;
        }
        match side {
            BracketSide::Winners => self.size >> round,
            // Losers rounds come in pairs of equal size: 2k-1 and 2k hold size / 2^(k+1).
            BracketSide::Losers => self.size >> (round.div_ceil(2) + 1),
            BracketSide::GrandFinal => 1,
            BracketSide::None => 0,
        }
    }

    pub fn contains(&self, node: NodeAddress) -> bool {
        node.slot >= 1 && node.slot <= self.matches_in_round(node.side, node.round)
    }

    /// Where the winner of `from` plays next; `None` means champion (or not in the bracket).
    pub fn winner_destination(&self, from: NodeAddress) -> Option<Destination> {
        if !self.contains(from) {
            return None;
        }
        let (r, s) = (from.round, from.slot);
        let dest = match from.side {
            BracketSide::Winners if r < self.winners_rounds => Destination {
                node: NodeAddress::new(BracketSide::Winners, r + 1, half_up(s)),
                position: SlotPosition::by_parity(s),
            },
            BracketSide::Winners => Destination {
                node: NodeAddress::grand_final(),
                position: SlotPosition::by_parity(s),
            },
            BracketSide::Losers if r < self.losers_rounds() => {
                if r % 2 == 1 {
                    // Survivors of an odd round meet drop-ins from the winners side.
                    Destination {
                        node: NodeAddress::new(BracketSide::Losers, r + 1, s),
                        position: SlotPosition::A,
                    }
                } else {
                    Destination {
                        node: NodeAddress::new(BracketSide::Losers, r + 1, half_up(s)),
                        position: SlotPosition::by_parity(s),
                    }
                }
            }
            BracketSide::Losers => Destination {
                node: NodeAddress::grand_final(),
                position: SlotPosition::B,
            },
            BracketSide::GrandFinal | BracketSide::None => return None,
        };
        Some(dest)
    }

    /// Where the loser of `from` drops to; `None` means eliminated.
    pub fn loser_destination(&self, from: NodeAddress) -> Option<Destination> {
        if self.format != BracketFormat::DoubleElimination
            || from.side != BracketSide::Winners
            || !self.contains(from)
        {
            return None;
        }
        let (r, s) = (from.round, from.slot);
        let dest = if r == 1 {
            Destination {
                node: NodeAddress::new(BracketSide::Losers, 1, half_up(s)),
                position: SlotPosition::by_parity(s),
            }
        } else {
            Destination {
                node: NodeAddress::new(BracketSide::Losers, 2 * (r - 1), s),
                position: SlotPosition::B,
            }
        };
        self.contains(dest.node).then_some(dest)
    }

    /// The nodes that feed `to`, in slot order. Empty for seeded first-round nodes.
    pub fn feeders(&self, to: NodeAddress) -> Vec<Feeder> {
        if !self.contains(to) {
            return Vec::new();
        }
        let (r, t) = (to.round, to.slot);
        let pair = |side: BracketSide, round: u32, feed: Feed| {
            vec![
                Feeder {
                    from: NodeAddress::new(side, round, 2 * t - 1),
                    feed,
                    position: SlotPosition::A,
                },
                Feeder {
                    from: NodeAddress::new(side, round, 2 * t),
                    feed,
                    position: SlotPosition::B,
                },
            ]
        };
        match to.side {
            BracketSide::Winners if r == 1 => Vec::new(),
            BracketSide::Winners => pair(BracketSide::Winners, r - 1, Feed::Winner),
            BracketSide::Losers if r == 1 => pair(BracketSide::Winners, 1, Feed::Loser),
            BracketSide::Losers if r % 2 == 0 => vec![
                Feeder {
                    from: NodeAddress::new(BracketSide::Losers, r - 1, t),
                    feed: Feed::Winner,
                    position: SlotPosition::A,
                },
                Feeder {
                    from: NodeAddress::new(BracketSide::Winners, r / 2 + 1, t),
                    feed: Feed::Loser,
                    position: SlotPosition::B,
                },
            ],
            BracketSide::Losers => pair(BracketSide::Losers, r - 1, Feed::Winner),
            BracketSide::GrandFinal => match self.format {
                BracketFormat::DoubleElimination => vec![
                    Feeder {
                        from: NodeAddress::new(BracketSide::Winners, self.winners_rounds, 1),
                        feed: Feed::Winner,
                        position: SlotPosition::A,
                    },
                    Feeder {
                        from: NodeAddress::new(BracketSide::Losers, self.losers_rounds(), 1),
                        feed: Feed::Winner,
                        position: SlotPosition::B,
                    },
                ],
                BracketFormat::SingleElimination => {
                    pair(BracketSide::Winners, self.winners_rounds, Feed::Winner)
                }
            },
            BracketSide::None => Vec::new(),
        }
    }

    /// Every node address of the bracket, side by side and round by round.
    pub fn nodes(&self) -> Vec<NodeAddress> {
        let mut all = Vec::new();
        for side in [BracketSide::Winners, BracketSide::Losers, BracketSide::GrandFinal] {
            for round in 1..=self.rounds(side) {
                for slot in 1..=self.matches_in_round(side, round) {
                    all.push(NodeAddress::new(side, round, slot));
                }
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn de(size: usize) -> BracketShape {
        BracketShape::new(BracketFormat::DoubleElimination, size).unwrap()
    }

    fn w(round: u32, slot: u32) -> NodeAddress {
        NodeAddress::new(BracketSide::Winners, round, slot)
    }

    fn l(round: u32, slot: u32) -> NodeAddress {
        NodeAddress::new(BracketSide::Losers, round, slot)
    }

    #[test]
    fn rejects_non_power_of_two_sizes() {
        for size in [0, 2, 3, 6, 12] {
            assert!(BracketShape::new(BracketFormat::DoubleElimination, size).is_err());
        }
    }

    #[test]
    fn eight_team_first_round_routing() {
        let shape = de(8);
        let win = shape.winner_destination(w(1, 1)).unwrap();
        assert_eq!(win.node, w(2, 1));
        assert_eq!(win.position, SlotPosition::A);
        let lose = shape.loser_destination(w(1, 1)).unwrap();
        assert_eq!(lose.node, l(1, 1));
        assert_eq!(shape.loser_destination(w(1, 4)).unwrap().node, l(1, 2));
        assert_eq!(shape.loser_destination(w(2, 2)).unwrap().node, l(2, 2));
        assert_eq!(shape.loser_destination(w(3, 1)).unwrap().node, l(4, 1));
    }

    #[test]
    fn winners_final_goes_to_grand_final_and_drops_same_slot() {
        let shape = de(4);
        assert_eq!(shape.winners_rounds, 2);
        let win = shape.winner_destination(w(2, 1)).unwrap();
        assert_eq!(win.node, NodeAddress::grand_final());
        assert_eq!(win.position, SlotPosition::A);
        let lose = shape.loser_destination(w(2, 1)).unwrap();
        assert_eq!(lose.node, l(2, 1));
        assert_eq!(lose.position, SlotPosition::B);
    }

    #[test]
    fn losers_rounds_alternate_merge_and_halve() {
        let shape = de(8);
        assert_eq!(shape.losers_rounds(), 4);
        assert_eq!(shape.winner_destination(l(1, 2)).unwrap().node, l(2, 2));
        assert_eq!(shape.winner_destination(l(2, 2)).unwrap().node, l(3, 1));
        assert_eq!(shape.winner_destination(l(3, 1)).unwrap().node, l(4, 1));
        let last = shape.winner_destination(l(4, 1)).unwrap();
        assert_eq!(last.node, NodeAddress::grand_final());
        assert_eq!(last.position, SlotPosition::B);
        assert!(shape.loser_destination(l(1, 1)).is_none());
        assert!(shape.winner_destination(NodeAddress::grand_final()).is_none());
    }

    #[test]
    fn out_of_range_addresses_route_nowhere() {
        let shape = de(8);
        assert!(shape.winner_destination(w(4, 1)).is_none());
        assert!(shape.winner_destination(w(1, 5)).is_none());
        assert!(shape.loser_destination(w(0, 1)).is_none());
        assert!(shape.feeders(l(5, 1)).is_empty());
    }

    #[test]
    fn feeders_invert_the_routing_functions() {
        for shape in [
            de(4),
            de(8),
            de(16),
            de(32),
            de(64),
            BracketShape::new(BracketFormat::SingleElimination, 8).unwrap(),
        ] {
            for node in shape.nodes() {
                for feeder in shape.feeders(node) {
                    assert!(shape.contains(feeder.from), "{} feeds {}", feeder.from, node);
                    let dest = match feeder.feed {
                        Feed::Winner => shape.winner_destination(feeder.from),
                        Feed::Loser => shape.loser_destination(feeder.from),
                    };
                    assert_eq!(
                        dest,
                        Some(Destination { node, position: feeder.position }),
                        "feeder {} of {}",
                        feeder.from,
                        node
                    );
                }
            }
        }
    }

    #[test]
    fn every_non_seeded_node_has_two_feeders() {
        let shape = de(16);
        for node in shape.nodes() {
            let expected = if node.side == BracketSide::Winners && node.round == 1 { 0 } else { 2 };
            assert_eq!(shape.feeders(node).len(), expected, "{}", node);
        }
    }

    #[test]
    fn playoff_shape_has_quarters_semis_and_final() {
        let shape = BracketShape::new(BracketFormat::SingleElimination, 8).unwrap();
        assert_eq!(shape.matches_in_round(BracketSide::Winners, 1), 4);
        assert_eq!(shape.matches_in_round(BracketSide::Winners, 2), 2);
        assert_eq!(shape.winner_destination(w(1, 2)).unwrap().node, w(2, 1));
        assert_eq!(shape.winner_destination(w(1, 3)).unwrap().node, w(2, 2));
        let sf2 = shape.winner_destination(w(2, 2)).unwrap();
        assert_eq!(sf2.node, NodeAddress::grand_final());
        assert_eq!(sf2.position, SlotPosition::B);
        assert!(shape.loser_destination(w(1, 1)).is_none());
    }
}
