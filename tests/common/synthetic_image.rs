use glyph_conditioning::Raster;

/// White canvas with a black axis-aligned square `[lo, hi)` on both axes.
pub fn solid_square(size: u32, lo: u32, hi: u32) -> Raster {
    assert!(lo < hi && hi <= size, "square must fit the canvas");
    let data = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                0u8
            } else {
                255u8
            }
        })
        .collect();
    Raster::from_gray(size, size, data).expect("buffer covers the canvas")
}

/// Generates a simple high-contrast checkerboard image.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> Raster {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");

    let mut img = vec![0u8; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let sum = x / cell + y / cell;
            let val = if sum & 1 == 0 { 32u8 } else { 220u8 };
            img[(y * width + x) as usize] = val;
        }
    }
    Raster::from_gray(width, height, img).expect("buffer covers the canvas")
}

/// Uniform gray canvas.
pub fn blank(width: u32, height: u32, value: u8) -> Raster {
    Raster::from_gray(width, height, vec![value; (width * height) as usize]).expect("buffer covers the canvas")
}
