//! crates/tarot_journal_core/src/draw.rs
//!
//! The draw engine: samples three distinct cards from the catalog and
//! assigns each a random orientation and a fixed positional label.

use rand::Rng;

use crate::catalog::Catalog;
use crate::domain::{DrawnCard, Position};

/// Draws a three-card spread with a fresh thread-local RNG.
///
/// Positions are always `[Past, Present, Future]` in that order; the cards
/// are sampled without replacement, so the three card ids are pairwise
/// distinct. Orientation is an independent fair coin per card.
pub fn draw_spread(catalog: &Catalog) -> Vec<DrawnCard> {
    draw_spread_with(catalog, &mut rand::thread_rng())
}

/// Draws a three-card spread using the supplied RNG. Exposed so tests can
/// pass a seeded generator.
pub fn draw_spread_with<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> Vec<DrawnCard> {
    debug_assert!(catalog.len() >= Position::SPREAD.len());

    // Working copy of the deck; removal guarantees sampling without replacement.
    let mut deck: Vec<&_> = catalog.cards().iter().collect();
    Position::SPREAD
        .into_iter()
        .map(|position| {
            let index = rng.gen_range(0..deck.len());
            let card = deck.swap_remove(index);
            DrawnCard {
                card: card.clone(),
                is_reversed: rng.gen_bool(0.5),
                position,
            }
        })
        .collect()
}
