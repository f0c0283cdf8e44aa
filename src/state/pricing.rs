//! Pitch cost split between the two sides of a room.

/// Amounts owed per side and per player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSplit {
    /// Half the pitch price, whatever the headcount on each side.
    pub per_team: f64,
    /// Ceiling of `per_team / team_a`, 0 for an empty side.
    pub per_player_a: f64,
    /// Ceiling of `per_team / team_b`, 0 for an empty side.
    pub per_player_b: f64,
}

/// Split `pitch_price` evenly by side, then by headcount within each side.
///
/// Per-player amounts round up to the next whole currency unit, so the collected total
/// may slightly exceed the price but never falls short.
pub fn split(pitch_price: f64, team_a: usize, team_b: usize) -> PriceSplit {
    let per_team = pitch_price / 2.0;
    PriceSplit {
        per_team,
        per_player_a: per_player(per_team, team_a),
        per_player_b: per_player(per_team, team_b),
    }
}

fn per_player(per_team: f64, headcount: usize) -> f64 {
    if headcount == 0 {
        0.0
    } else {
        (per_team / headcount as f64).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_sides_round_up() {
        let split = split(100_000.0, 4, 6);
        assert_eq!(split.per_team, 50_000.0);
        assert_eq!(split.per_player_a, 12_500.0);
        assert_eq!(split.per_player_b, 8_334.0);
        assert!(split.per_player_b * 6.0 >= split.per_team);
    }

    #[test]
    fn empty_side_costs_nothing() {
        let split = split(80_000.0, 0, 3);
        assert_eq!(split.per_player_a, 0.0);
        assert_eq!(split.per_player_b, 13_334.0);
    }

    #[test]
    fn free_pitch() {
        assert_eq!(
            split(0.0, 5, 5),
            PriceSplit {
                per_team: 0.0,
                per_player_a: 0.0,
                per_player_b: 0.0,
            }
        );
    }
}
