use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::Array5;
use tempfile::NamedTempFile;
use voxstack_core::{DataSource, ElementType, Recorder, Shape5};
use voxstack_io::{MappedArraySource, RawVolumeWriter};
use voxstack_layer::{Layer, LayerEvent, LayerOptions, Normalizable, NormalizableLayer};

fn write_volume(values: &[f64], element_type: ElementType) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let data = Array5::from_shape_vec((1, values.len(), 1, 1, 1), values.to_vec()).unwrap();
    let mut writer = RawVolumeWriter::create(file.path()).unwrap();
    writer.write_array(&data, element_type).unwrap();
    file
}

#[test]
fn test_layer_follows_rewritten_file() {
    let file = write_volume(&[10.0, 20.0, 30.0, 40.0], ElementType::U8);
    let source = Arc::new(
        MappedArraySource::open(file.path(), ElementType::U8, Shape5::new(1, 4, 1, 1, 1))
            .unwrap(),
    );
    let mut layer =
        NormalizableLayer::grayscale(source.clone(), &LayerOptions::default()).unwrap();
    layer.refresh_bounds().unwrap();
    let active = layer.normalization().normalize(0).unwrap().unwrap();
    assert_relative_eq!(active.lo(), 10.0);
    assert_relative_eq!(active.hi(), 40.0);

    // rewrite in place without truncating the mapped file
    let mut handle = OpenOptions::new().write(true).open(file.path()).unwrap();
    handle.seek(SeekFrom::Start(0)).unwrap();
    handle.write_all(&[1, 2, 3, 200]).unwrap();
    handle.flush().unwrap();

    let rec = Recorder::attach(layer.events().signal());
    layer.refresh_bounds().unwrap();
    assert!(rec.is_empty(), "unchanged generation must reuse the cache");

    source.mark_dirty();
    layer.refresh_bounds().unwrap();
    let events = rec.take();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], LayerEvent::NormalizeChanged { slot: 0, .. }));
    let active = layer.normalization().normalize(0).unwrap().unwrap();
    assert_relative_eq!(active.lo(), 1.0);
    assert_relative_eq!(active.hi(), 200.0);
}

#[test]
fn test_float_volume_roundtrip_bounds() {
    let file = write_volume(&[-0.5, 0.25, 3.75], ElementType::F32);
    let source =
        MappedArraySource::open(file.path(), ElementType::F32, Shape5::new(1, 3, 1, 1, 1))
            .unwrap();
    let bounds = source.sample_bounds().unwrap();
    assert_relative_eq!(bounds.lo(), -0.5);
    assert_relative_eq!(bounds.hi(), 3.75);
    assert_eq!(source.element_type().default_range().hi(), 255.0);
}
