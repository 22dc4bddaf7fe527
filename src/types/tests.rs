use super::Watermark;

#[test]
fn test_epoch_watermark_is_zero() {
    assert_eq!(Watermark::EPOCH.step(), 0);
    assert_eq!(Watermark::default(), Watermark::EPOCH);
}

#[test]
fn test_watermark_admits_only_later_steps() {
    let watermark = Watermark::new(100);

    assert!(!watermark.admits(90));
    assert!(!watermark.admits(100));
    assert!(watermark.admits(101));
}

#[test]
fn test_watermark_include_never_moves_backwards() {
    let watermark = [5, 3, 7, 1].into_iter()
        .fold(Watermark::EPOCH, |watermark, step| watermark.include(step));

    assert_eq!(watermark, Watermark::new(7));
    assert_eq!(watermark.include(2), Watermark::new(7));
}

#[test]
fn test_watermark_displays_as_plain_step() {
    assert_eq!(Watermark::new(105).to_string(), "105");
}
