use crate::dice::Dice;
use crate::model::{Forces, OperationResources};

/// Hard bounds on every success chance, in percent.
pub const MIN_CHANCE: i64 = 5;
pub const MAX_CHANCE: i64 = 95;

/// Chance (percent) that a force of `committed` succeeds at an action with
/// `base` chance against `opponent` defense strength.
pub fn success_chance(committed: &Forces, base: i64, opponent: i64) -> i64 {
    let strength = committed.strength();
    let adjustment = if opponent > 0 {
        ratio_adjustment(strength as f64 / opponent as f64)
    } else {
        strength_adjustment(strength)
    };
    (base + adjustment).clamp(MIN_CHANCE, MAX_CHANCE)
}

fn ratio_adjustment(ratio: f64) -> i64 {
    match ratio {
        r if r >= 2.0 => 20,
        r if r >= 1.5 => 15,
        r if r >= 1.0 => 10,
        r if r >= 0.75 => 5,
        r if r >= 0.5 => -5,
        r if r >= 0.25 => -10,
        _ => -20,
    }
}

fn strength_adjustment(strength: i64) -> i64 {
    match strength {
        s if s >= 100 => 20,
        s if s >= 75 => 15,
        s if s >= 50 => 10,
        s if s >= 25 => 5,
        _ => 0,
    }
}

/// Commitment of one resource kind as a percentage of what was asked, capped at 200.
fn commitment(committed: i64, required: i64) -> f64 {
    if required == 0 {
        100.0
    } else {
        (committed as f64 / required as f64 * 100.0).min(200.0)
    }
}

/// Chance (percent) that an operation attempt succeeds, from its base rate
/// and how generously the player over- or under-committed forces.
pub fn operation_chance(
    base_rate: i64,
    committed: &OperationResources,
    required: &OperationResources,
) -> i64 {
    let avg = (commitment(committed.crew, required.crew)
        + commitment(committed.weapons, required.weapons)
        + commitment(committed.vehicles, required.vehicles))
        / 3.0;
    let chance = if avg > 100.0 {
        base_rate + ((avg - 100.0) / 10.0).floor() as i64
    } else {
        base_rate - ((100.0 - avg) / 5.0).floor() as i64
    };
    chance.clamp(MIN_CHANCE, MAX_CHANCE)
}

/// One success roll: `U[0,100) < chance`.
pub fn rolls_under(dice: &dyn Dice, chance: i64) -> bool {
    dice.unit() * 100.0 < chance as f64
}

/// `pct`% chance to lose `d(committed) + 1` units, never more than committed.
/// The percentage is always rolled; the amount only when something was committed.
pub fn roll_loss(dice: &dyn Dice, pct: f64, committed: i64) -> i64 {
    if dice.chance(pct) && committed > 0 {
        (dice.below(committed) + 1).min(committed)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::SeededDice;

    #[test]
    fn uncontested_strength_bands() {
        // 3 crew, 2 weapons, 1 vehicle = 80 strength -> +15
        assert_eq!(success_chance(&Forces::new(3, 2, 1), 75, 0), 90);
        assert_eq!(success_chance(&Forces::new(0, 0, 0), 70, 0), 70);
        assert_eq!(success_chance(&Forces::new(2, 0, 0), 70, 0), 70);
        assert_eq!(success_chance(&Forces::new(2, 1, 0), 70, 0), 75);
        assert_eq!(success_chance(&Forces::new(3, 0, 0), 70, 0), 75);
        assert_eq!(success_chance(&Forces::new(10, 0, 0), 70, 0), 90);
    }

    #[test]
    fn contested_ratio_bands() {
        let f = Forces::new(4, 0, 0); // 40
        assert_eq!(success_chance(&f, 50, 20), 70);
        assert_eq!(success_chance(&f, 50, 26), 65);
        assert_eq!(success_chance(&f, 50, 40), 60);
        assert_eq!(success_chance(&f, 50, 50), 55);
        assert_eq!(success_chance(&f, 50, 80), 45);
        assert_eq!(success_chance(&f, 50, 160), 40);
        assert_eq!(success_chance(&f, 50, 161), 30);
    }

    #[test]
    fn chance_is_always_clamped() {
        let dice = SeededDice::new(99);
        for _ in 0..2000 {
            let f = Forces::new(dice.range(0, 40), dice.range(0, 40), dice.range(0, 20));
            let base = dice.range(-50, 150);
            let opp = dice.range(0, 2000);
            let c = success_chance(&f, base, opp);
            assert!((MIN_CHANCE..=MAX_CHANCE).contains(&c), "{c}");
        }
        assert_eq!(success_chance(&Forces::default(), 0, 1000), MIN_CHANCE);
        assert_eq!(success_chance(&Forces::new(50, 50, 50), 100, 0), MAX_CHANCE);
    }

    #[test]
    fn exact_commitment_keeps_base_rate() {
        let req = OperationResources {
            crew: 2,
            weapons: 1,
            vehicles: 0,
            money: 500,
        };
        assert_eq!(operation_chance(60, &req, &req), 60);
    }

    #[test]
    fn over_and_under_commitment_shift_chance() {
        let req = OperationResources {
            crew: 2,
            weapons: 2,
            vehicles: 2,
            money: 0,
        };
        let double = OperationResources {
            crew: 4,
            weapons: 4,
            vehicles: 4,
            money: 0,
        };
        // avg 200 -> +10
        assert_eq!(operation_chance(60, &double, &req), 70);
        let half = OperationResources {
            crew: 1,
            weapons: 1,
            vehicles: 1,
            money: 0,
        };
        // avg 50 -> -10
        assert_eq!(operation_chance(60, &half, &req), 50);
        // commitment caps at 200 per kind
        let huge = OperationResources {
            crew: 100,
            weapons: 100,
            vehicles: 100,
            money: 0,
        };
        assert_eq!(operation_chance(60, &huge, &req), 70);
        assert_eq!(operation_chance(2, &OperationResources::default(), &req), MIN_CHANCE);
    }

    #[test]
    fn loss_never_exceeds_commitment() {
        let dice = SeededDice::new(5);
        for committed in 0..6 {
            for _ in 0..200 {
                let lost = roll_loss(&dice, 100.0, committed);
                assert!(lost <= committed);
                assert_eq!(lost == 0, committed == 0);
            }
        }
    }
}
