#![allow(dead_code)]

use pmd_kaomado::{Kaomado, Palette, Portrait, Rgb};

/// Red, green, blue and yellow in a 2x2 checker pattern.
pub fn four_colour_portrait() -> Portrait {
    let palette = Palette::from_colours(&[
        Rgb::new(255, 0, 0),
        Rgb::new(0, 255, 0),
        Rgb::new(0, 0, 255),
        Rgb::new(255, 255, 0),
    ]);
    let pixels = (0..40 * 40)
        .map(|i| {
            let (x, y) = (i % 40, i / 40);
            ((x % 2) + (y % 2) * 2) as u8
        })
        .collect();
    Portrait::new(palette, pixels).unwrap()
}

/// A portrait using all 16 colours, different for every seed.
pub fn seeded_portrait(seed: u8) -> Portrait {
    let colours: Vec<Rgb> = (0..16u8)
        .map(|i| Rgb::new(i.wrapping_mul(16), seed, 255 - i))
        .collect();
    let pixels = (0..40 * 40)
        .map(|i| ((i / 7 + seed as usize * 3 + (i % 40) / 5) % 16) as u8)
        .collect();
    Portrait::new(Palette::from_colours(&colours), pixels).unwrap()
}

/// Lists every populated slot with a copy of its portrait.
pub fn contents(kao: &Kaomado) -> Vec<(usize, usize, Portrait)> {
    kao.portraits()
        .map(|(entry, subentry, portrait)| (entry, subentry, portrait.clone()))
        .collect()
}
