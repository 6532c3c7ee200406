use lodepng::ColorType;
use octquant::*;

fn gradient(width: usize, height: usize) -> Vec<RGBA> {
    (0..height).flat_map(|y| {
        (0..width).map(move |x| RGBA::new((x * 255 / (width - 1)) as u8, (y * 255 / (height - 1)) as u8, ((x + y) * 2 % 256) as u8, 255))
    }).collect()
}

fn image(attr: &Attributes, px: &[RGBA], width: usize, height: usize) -> Image<'static, RGBA> {
    attr.new_image(px, width, height).unwrap()
}

fn encode_indexed(res: &QuantizedImage) -> Vec<u8> {
    let mut enc = lodepng::Encoder::new();
    enc.set_auto_convert(false);
    enc.info_raw_mut().colortype = ColorType::PALETTE;
    enc.info_raw_mut().set_bitdepth(8);
    enc.info_png_mut().color.colortype = ColorType::PALETTE;
    enc.info_png_mut().color.set_bitdepth(8);
    for &c in res.palette() {
        enc.info_raw_mut().palette_add(c).unwrap();
        enc.info_png_mut().color.palette_add(c).unwrap();
    }
    enc.encode(res.indices(), res.width(), res.height()).unwrap()
}

fn mean_error(a: &[RGBA], b: &[RGBA]) -> f64 {
    let sum: u64 = a.iter().zip(b).map(|(a, b)| {
        let d = |x: u8, y: u8| (i64::from(x) - i64::from(y)).pow(2) as u64;
        d(a.r, b.r) + d(a.g, b.g) + d(a.b, b.b) + d(a.a, b.a)
    }).sum();
    sum as f64 / a.len() as f64
}

#[test]
fn indexed_png_round_trip() {
    let px = gradient(64, 48);
    let mut attr = new();
    attr.set_max_colors(16);
    attr.set_dithering(false);
    let mut img = image(&attr, &px, 64, 48);
    let res = attr.quantize(&mut img).unwrap();
    assert_eq!(17, res.palette().len());
    assert!(res.indices().iter().all(|&i| usize::from(i) < 16));

    let png = encode_indexed(&res);
    let decoded = lodepng::decode32(&png).unwrap();
    assert_eq!((64, 48), (decoded.width, decoded.height));
    assert_eq!(res.remapped_rgba().unwrap(), decoded.buffer);
    assert!(mean_error(&px, &decoded.buffer) < 3. * 64. * 64., "{}", mean_error(&px, &decoded.buffer));
}

#[test]
fn few_colors_survive_png() {
    let colors = [
        RGBA::new(255, 255, 255, 255),
        RGBA::new(12, 34, 56, 255),
        RGBA::new(200, 10, 10, 255),
        RGBA::new(0, 0, 0, 0),
    ];
    let px: Vec<_> = (0..30 * 20).map(|i| colors[(i / 7 + i / 30) % colors.len()]).collect();
    let png = lodepng::encode32(&px, 30, 20).unwrap();
    let mut decoded = lodepng::decode32(&png).unwrap();

    let mut attr = new();
    attr.set_dithering(false);
    let mut img = attr.new_image_borrowed(&mut decoded.buffer, 30, 20).unwrap();
    let res = attr.quantize(&mut img).unwrap();
    assert_eq!(px, res.remapped_rgba().unwrap());

    let t = res.transparent_index();
    for (&p, &i) in px.iter().zip(res.indices()) {
        assert_eq!(p == colors[3], i == t);
    }
    let again = lodepng::decode32(&encode_indexed(&res)).unwrap();
    assert_eq!(px, again.buffer);
}

#[test]
fn dithered_gradient() {
    let px = gradient(40, 40);
    for kernel in [FLOYD_STEINBERG, ATKINSON, BURKS, JARVIS_JUDICE_NINKE, SIERRA2, SIERRA3, SIERRA_LITE, STUCKI] {
        let mut attr = new();
        attr.set_max_colors(8);
        attr.set_ditherer(kernel);
        let mut img = image(&attr, &px, 40, 40);
        let res = attr.quantize(&mut img).unwrap();
        assert_eq!(9, res.palette().len());
        assert_eq!(40 * 40, res.indices().len());

        let decoded = lodepng::decode32(&encode_indexed(&res)).unwrap();
        assert_eq!(res.remapped_rgba().unwrap(), decoded.buffer);

        // error diffusion rewrote the source pixels
        let diffused = img.into_pixels();
        assert_ne!(&px[..], &diffused[..], "{}", kernel.name);
    }
}

#[test]
fn dithering_keeps_average_brightness() {
    let px: Vec<_> = (0..64 * 16).map(|i| {
        let v = (i % 64 * 4) as u8;
        RGBA::new(v, v, v, 255)
    }).collect();
    let mut attr = new();
    let mut q = PaletteQuantizer::with_palette(&attr, &[RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255)]).unwrap();
    let res = q.quantize(&attr, &mut image(&attr, &px, 64, 16)).unwrap();
    let out = res.remapped_rgba().unwrap();
    let avg = |p: &[RGBA]| p.iter().map(|c| f64::from(c.r)).sum::<f64>() / p.len() as f64;
    assert!((avg(&px) - avg(&out)).abs() < 8., "{} {}", avg(&px), avg(&out));

    // without dithering there are only two bands
    attr.set_dithering(false);
    let res = q.quantize(&attr, &mut image(&attr, &px, 64, 16)).unwrap();
    assert!(res.indices()[..32].iter().all(|&i| i == 0));
    assert!(res.indices()[33..64].iter().all(|&i| i == 1));
}

#[test]
fn strided_region() {
    // 3×2 region of a 5-pixel-wide buffer
    let red = RGBA::new(255, 0, 0, 255);
    let green = RGBA::new(0, 255, 0, 255);
    let pad = RGBA::new(1, 2, 3, 4);
    let mut buf = vec![
        red, green, red, pad, pad,
        green, green, red, pad, pad,
    ];
    let mut attr = new();
    attr.set_dithering(false);
    let mut img = attr.new_image_stride(&mut buf, 3, 2, 5).unwrap();
    let res = attr.quantize(&mut img).unwrap();
    assert!(!res.palette().contains(&pad));
    assert_eq!(vec![red, green, red, green, green, red], res.remapped_rgba().unwrap());
}

#[test]
fn large_image_exact_pass() {
    let px = gradient(300, 200);
    let mut attr = new();
    attr.set_dithering(false);
    attr.set_max_colors(100);
    let mut q = OctreeQuantizer::new(&attr);
    let a = q.quantize(&attr, &mut image(&attr, &px, 300, 200)).unwrap();
    assert!(q.leaf_count() <= 100);
    let b = q.quantize(&attr, &mut image(&attr, &px, 300, 200)).unwrap();
    assert_eq!(a.indices(), b.indices());
    assert_eq!(a.palette(), b.palette());
}

#[test]
fn web_safe_palette() {
    let px = gradient(20, 20);
    let mut attr = new();
    attr.set_dithering(false);
    let res = PaletteQuantizer::new(&attr).quantize(&attr, &mut image(&attr, &px, 20, 20)).unwrap();
    assert_eq!(216, res.palette().len());
    for (p, q) in px.iter().zip(res.remapped_rgba().unwrap()) {
        assert!(p.r.abs_diff(q.r) <= 26 && p.g.abs_diff(q.g) <= 26 && p.b.abs_diff(q.b) <= 26);
    }
}

#[test]
fn log_messages() {
    use std::sync::{Arc, Mutex};

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut attr = new();
    let log2 = log.clone();
    attr.set_log_callback(move |_, msg| log2.lock().unwrap().push(msg.to_string()));
    let mut img = image(&attr, &gradient(8, 8), 8, 8);
    attr.quantize(&mut img).unwrap();
    assert!(log.lock().unwrap().iter().any(|m| m.contains("palette")));

    let mut empty: [RGBA; 0] = [];
    assert_eq!(Err(Error::Unsupported), attr.new_image_borrowed(&mut empty, 0, 0).map(|_| ()));
    assert!(log.lock().unwrap().iter().any(|m| m.contains("no pixels")));
}
