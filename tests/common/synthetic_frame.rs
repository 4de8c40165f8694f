use image::{Rgb, RgbImage};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 300;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const HEADER_GRAY: Rgb<u8> = Rgb([225, 225, 225]);
const OUTLINE_GRAY: Rgb<u8> = Rgb([120, 120, 120]);
const CELL_GRAY: Rgb<u8> = Rgb([200, 200, 200]);

/// 40x30 logo, red left half and blue right half.
pub fn reference_logo() -> RgbImage {
    RgbImage::from_fn(40, 30, |x, _| {
        if x < 20 {
            Rgb([220, 30, 30])
        } else {
            Rgb([30, 30, 220])
        }
    })
}

fn fill(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, colour: Rgb<u8>) {
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, colour);
        }
    }
}

fn outline(image: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, colour: Rgb<u8>) {
    for x in x0..=x1 {
        image.put_pixel(x, y0, colour);
        image.put_pixel(x, y1, colour);
    }
    for y in y0..=y1 {
        image.put_pixel(x0, y, colour);
        image.put_pixel(x1, y, colour);
    }
}

/// White page with one header bar (rows 0..=30) and one outlined data row
/// (rows 40..=190, height 151) holding the logo on the left and two odds
/// cells on the right.
pub fn odds_page() -> RgbImage {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);

    fill(&mut image, 0, 0, WIDTH, 31, HEADER_GRAY);

    outline(&mut image, 10, 40, 789, 190, OUTLINE_GRAY);
    image::imageops::replace(&mut image, &reference_logo(), 30, 85);
    fill(&mut image, 370, 95, 100, 40, CELL_GRAY);
    fill(&mut image, 570, 95, 100, 40, CELL_GRAY);

    image
}

/// Page with the same layout but a logo the matcher was not configured with.
pub fn foreign_page() -> RgbImage {
    let mut image = odds_page();
    fill(&mut image, 30, 85, 40, 30, Rgb([20, 180, 20]));
    image
}

pub fn to_rgba(image: &RgbImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2], 255])
        .collect()
}
