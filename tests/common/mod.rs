//! Synthetic images shared by the integration tests
#![allow(dead_code)]

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use salient_tiles::{Channels, Image};

/// Deterministic pseudo-random bytes (64-bit LCG, high byte)
pub fn noise_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

pub fn flat_gray(width: u32, height: u32, value: u8) -> Image {
    Image::filled_gray(width, height, value)
}

pub fn noise_rgb(width: u32, height: u32, seed: u64) -> Image {
    let len = (width * height * 3) as usize;
    Image::new(width, height, Channels::Rgb, noise_bytes(len, seed)).unwrap()
}

/// Left half black, right half white, as RGB
pub fn split_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

pub fn write_rgb_png(path: &Path, width: u32, height: u32) {
    split_rgb(width, height).save(path).unwrap();
}

pub fn write_gray_png(path: &Path, width: u32, height: u32, value: u8) {
    GrayImage::from_pixel(width, height, Luma([value])).save(path).unwrap();
}
