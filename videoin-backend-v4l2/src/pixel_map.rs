//! Pixel format plumbing between V4L2 buffers and I420 frames.

use v4l::format::fourcc::FourCC;

/// Planar YUV 4:2:0, what the controller hands out
pub const I420: [u8; 4] = *b"YU12";
/// Packed YUV 4:2:2, what most UVC webcams offer
pub const YUYV: [u8; 4] = *b"YUYV";

/// Capture formats we can turn into I420, best first.
pub fn preferred() -> [FourCC; 2] {
    [FourCC::new(&I420), FourCC::new(&YUYV)]
}

pub fn is_supported(cc: FourCC) -> bool {
    preferred().contains(&cc)
}

fn i420_len(width: usize, height: usize) -> usize {
    width * height + 2 * width.div_ceil(2) * height.div_ceil(2)
}

/// Converts a YUYV buffer into I420. Chroma of odd rows is dropped.
pub fn yuyv_to_i420(src: &[u8], width: usize, height: usize, dst: &mut Vec<u8>) {
    let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
    dst.clear();
    dst.resize(i420_len(width, height), 128);

    let stride = width * 2;
    let (y_plane, chroma) = dst.split_at_mut(width * height);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    for row in 0..height {
        let Some(line) = src.get(row * stride..(row + 1) * stride) else {
            break;
        };
        for (col, y) in y_plane[row * width..(row + 1) * width].iter_mut().enumerate() {
            *y = line[col * 2];
        }
        if row % 2 == 0 {
            for pair in 0..width / 2 {
                u_plane[(row / 2) * cw + pair] = line[pair * 4 + 1];
                v_plane[(row / 2) * cw + pair] = line[pair * 4 + 3];
            }
        }
    }
}

/// Nearest-neighbour resize of an I420 frame.
pub fn scale_i420(src: &[u8], sw: usize, sh: usize, dst: &mut Vec<u8>, dw: usize, dh: usize) {
    dst.clear();
    dst.resize(i420_len(dw, dh), 128);
    if sw == 0 || sh == 0 || src.len() < i420_len(sw, sh) {
        return;
    }

    let (src_y, src_chroma) = src.split_at(sw * sh);
    let (src_u, src_v) = src_chroma.split_at(sw.div_ceil(2) * sh.div_ceil(2));
    let (dst_y, dst_chroma) = dst.split_at_mut(dw * dh);
    let (dst_u, dst_v) = dst_chroma.split_at_mut(dw.div_ceil(2) * dh.div_ceil(2));

    resample(src_y, sw, sh, dst_y, dw, dh);
    let (scw, sch, dcw, dch) = (sw.div_ceil(2), sh.div_ceil(2), dw.div_ceil(2), dh.div_ceil(2));
    resample(&src_u[..scw * sch], scw, sch, dst_u, dcw, dch);
    resample(&src_v[..scw * sch], scw, sch, dst_v, dcw, dch);
}

fn resample(src: &[u8], sw: usize, sh: usize, dst: &mut [u8], dw: usize, dh: usize) {
    for row in 0..dh {
        let sy = row * sh / dh;
        for col in 0..dw {
            dst[row * dw + col] = src[sy * sw + col * sw / dw];
        }
    }
}
