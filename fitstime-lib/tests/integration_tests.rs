mod common;

use std::fs;

use fitstime::resolve::HJD_CALC;
use fitstime::{
    analyze, find_time, Almanac, BaseField, ElementKind, Error, Fits, Header, NoData, Note,
    Outcome, ResolveOptions, BLOCK_LEN,
};
use ndarray::{Array2, ArrayD};
use rand::Rng;

use common::{header_bytes, write_fixture};

fn random_image(rows: usize, cols: usize) -> ArrayD<f64> {
    let mut rng = rand::thread_rng();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-500.0..12_000.0)).into_dyn()
}

#[test]
fn integer_round_trip_within_scale() {
    let tmpdir = tempfile::tempdir().unwrap();
    let data = random_image(17, 23);

    for kind in [ElementKind::I16, ElementKind::I32] {
        let path = tmpdir.path().join(format!("image{}.fits", kind.bitpix()));
        let mut fits = Fits::new(Header::default(), Some(data.clone()));
        fits.save(&path, kind).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len() % BLOCK_LEN as u64, 0);

        let got = Fits::open(&path).unwrap();
        assert_eq!(got.header.number("BITPIX"), Some(kind.bitpix() as f64));
        let bscale = got.header.number("BSCALE").unwrap();
        let got_data = got.data.unwrap();
        assert_eq!(got_data.shape(), data.shape());
        for (a, b) in got_data.iter().zip(data.iter()) {
            assert!((a - b).abs() <= bscale, "{kind:?}: {a} != {b} (bscale {bscale})");
        }
    }
}

#[test]
fn float_is_unscaled() {
    let data = Array2::from_shape_fn((4, 6), |(r, c)| r as f64 * 0.25 - c as f64).into_dyn();
    let mut fits = Fits::new(Header::default(), Some(data.clone()));
    let mut out = Vec::new();
    fits.write(&mut out, ElementKind::F32).unwrap();

    let got = Fits::read(&out[..]).unwrap();
    assert_eq!(got.header.get("BITPIX"), Some("-32"));
    assert_eq!(got.header.get("BSCALE"), Some("1"));
    assert_eq!(got.header.get("BZERO"), Some("0"));
    assert_eq!(got.data.unwrap(), data);
}

#[test]
fn rewrite_is_stable() {
    let dat = [
        header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    3",
            "NAXIS2  =                    2",
            "OBJECT  = 'M31     '           / target",
            "DATE-OBS= '2005-06-01T03:00:00'",
            "AIRMASS =                 1.21",
            "HISTORY first line",
            "COMMENT a comment",
        ]),
        {
            let mut d = vec![0u8; 12];
            d.resize(BLOCK_LEN, 0);
            d
        },
    ]
    .concat();

    let mut fits = Fits::read(&dat[..]).unwrap();
    let mut first = Vec::new();
    fits.write(&mut first, ElementKind::I16).unwrap();

    let mut again = Fits::read(&first[..]).unwrap();
    let mut second = Vec::new();
    again.write(&mut second, ElementKind::I16).unwrap();

    assert_eq!(first, second);
    let cards: Vec<&[u8]> = first.chunks(80).collect();
    assert!(cards[0].starts_with(b"SIMPLE  ="));
    assert!(cards[1].starts_with(b"BITPIX  =                   16"));
    assert!(cards[2].starts_with(b"NAXIS   ="));
    assert!(cards[5].starts_with(b"COMMENT a comment"));
    assert!(cards[6].starts_with(b"OBJECT  = 'M31     '"));
}

#[test]
fn missing_end_is_fatal() {
    let mut dat = Vec::new();
    for _ in 0..40 {
        dat.extend_from_slice(format!("{:<80}", "COMMENT no end").as_bytes());
    }
    let err = Fits::read_header(&dat[..]).unwrap_err();
    assert!(matches!(err, Error::MissingEnd { cards: 40 }), "{err:?}");
}

#[test]
fn short_data_is_rejected() {
    let mut dat = header_bytes(&[
        "SIMPLE  =                    T",
        "BITPIX  =                   32",
        "NAXIS   =                    2",
        "NAXIS1  =                  100",
        "NAXIS2  =                  100",
    ]);
    dat.extend_from_slice(&[0u8; BLOCK_LEN]);
    let err = Fits::read(&dat[..]).unwrap_err();
    assert!(
        matches!(
            err,
            Error::DataLength {
                actual: BLOCK_LEN,
                expected: 40_000
            }
        ),
        "{err:?}"
    );
}

#[test]
fn huge_axes_are_a_length_error() {
    let mut dat = header_bytes(&[
        "SIMPLE  =                    T",
        "BITPIX  =                   16",
        "NAXIS   =                    2",
        "NAXIS1  =              1000000",
        "NAXIS2  =              1000000",
    ]);
    dat.extend_from_slice(&[0u8; 16]);
    let err = Fits::read(&dat[..]).unwrap_err();
    assert!(
        matches!(
            err,
            Error::DataLength {
                actual: 16,
                expected: 2_000_000_000_000
            }
        ),
        "{err:?}"
    );
}

#[test]
fn overflowing_axes_are_invalid() {
    let mut dat = header_bytes(&[
        "SIMPLE  =                    T",
        "BITPIX  =                   16",
        "NAXIS   =                    2",
        "NAXIS1  =        4294967296000",
        "NAXIS2  =        4294967296000",
    ]);
    dat.extend_from_slice(&[0u8; 16]);
    let err = Fits::read(&dat[..]).unwrap_err();
    assert!(
        matches!(&err, Error::InvalidCard { key, .. } if key == "NAXIS"),
        "{err:?}"
    );
}

#[test]
fn unsupported_bitpix() {
    let dat = header_bytes(&[
        "SIMPLE  =                    T",
        "BITPIX  =                  -64",
        "NAXIS   =                    0",
    ]);
    let err = Fits::read(&dat[..]).unwrap_err();
    assert!(matches!(err, Error::UnsupportedBitpix(-64)), "{err:?}");
}

#[test]
fn find_time_end_to_end() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        tmpdir.path(),
        "obs.fits",
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    0",
            "DATE-OBS= '2005-06-01T03:00:00'",
            "EXPTIME =                  120 / seconds",
            "RA      = '10:20:30'",
            "DEC     = '-20:15:10'",
        ],
    );

    let options = ResolveOptions::builder().diagnostics(true).build();
    let res = find_time(&path, &options, &Almanac).unwrap();

    let jd = res.outcome.time().unwrap();
    assert!(jd.is_finite() && jd > 2_450_000.0);
    let start = 2_453_522.625;
    let expected = start + res.resolved.helio_days + 60.0 / 86400.0;
    assert!((jd - expected).abs() < 1e-8, "{jd} {expected}");
    assert!(res.resolved.helio_days.abs() < 0.006);

    let derived = res.resolved.derived.as_ref().unwrap();
    assert_eq!(derived.field, HJD_CALC);
    assert_eq!(derived.confidence, 200.0);
    assert_eq!(res.resolved.categories.hjds[0].field, HJD_CALC);
    assert!((res.resolved.ra.value - (10.0 + 20.0 / 60.0 + 30.0 / 3600.0)).abs() < 1e-9);
    assert!(res.resolved.dec.value < -20.0);
    assert!(res
        .transcript
        .any(|n| matches!(n, Note::Derived { .. })));

    let report = res.report.unwrap();
    assert_eq!(report.values.get(HJD_CALC), Some(&jd));
}

#[test]
fn find_time_missing_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let err = find_time(
        tmpdir.path().join("absent.fits"),
        &ResolveOptions::default(),
        &Almanac,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
}

#[test]
fn header_without_times() {
    let dat = header_bytes(&[
        "SIMPLE  =                    T",
        "BITPIX  =                   16",
        "NAXIS   =                    0",
        "OBJECT  = 'M31'",
    ]);
    let header = Fits::read_header(&dat[..]).unwrap();
    let res = analyze(&header, &ResolveOptions::default(), &Almanac);
    assert_eq!(res.outcome, Outcome::NoData(NoData::MissingTemporalData));
    assert!(res.report.is_none());
    assert!(res.transcript.any(|n| *n == Note::MissingTemporalData));
}

#[test]
fn jd_base_with_offsets() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = tmpdir.path().join("jd.fits");
    fs::write(
        &path,
        header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    0",
            "MJD-OBS =            53522.125",
            "EXPOSURE=                864.0",
        ]),
    )
    .unwrap();

    let options = ResolveOptions::builder()
        .base(BaseField::MjdObs)
        .exposure(1)
        .extra_days(1.0)
        .build();
    let res = find_time(&path, &options, &Almanac).unwrap();
    let jd = res.outcome.time().unwrap();
    assert!((jd - (2_453_522.625 + 0.005 + 1.0)).abs() < 1e-9, "{jd}");
    assert!(res.report.is_none());
}
