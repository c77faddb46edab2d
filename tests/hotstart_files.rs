mod util;
use util::*;

use mesh_regrid::io::hotstart::{
    HEADER_RECORDS, HotstartCodec, HotstartHeader, HotstartRecord, RECORD_BYTES,
    WETTING_COEFFICIENT_FLAG,
};
use mesh_regrid::io::layout::{HotstartScope, PartitionLayout};
use mesh_regrid::mesh_error::MeshRegridError;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs;

fn random_record(rng: &mut SmallRng, model_flag: i32, nodes: usize, elements: usize) -> HotstartRecord {
    let mut rec = HotstartRecord::zeroed(HotstartHeader {
        file_format_version: 1_050_624,
        model_flag,
        time: rng.gen_range(0.0..86_400.0),
        time_step: rng.gen_range(0..100_000),
        global_nodes: nodes as i32 * 3,
        global_elements: elements as i32 * 3,
        nodes: nodes as i32,
        elements: elements as i32,
    });
    for array in rec.node_arrays_mut() {
        array.iter_mut().for_each(|x| *x = rng.gen_range(-5.0..5.0));
    }
    rec.node_code.iter_mut().for_each(|c| *c = rng.gen_range(0..2));
    rec.element_off.iter_mut().for_each(|c| *c = rng.gen_range(0..2));
    rec.trailing.iter_mut().for_each(|c| *c = rng.gen_range(-3..1000));
    rec
}

#[test]
fn binary_image_has_fixed_record_size() {
    let mut rng = SmallRng::seed_from_u64(7);
    for (flag, arrays) in [(WETTING_COEFFICIENT_FLAG, 6), (0, 5)] {
        let rec = random_record(&mut rng, flag, 11, 13);
        let bytes = HotstartCodec::encode(&rec).unwrap();
        let records = HEADER_RECORDS + arrays * 11 + 11 + 13 + 17;
        assert_eq!(bytes.len(), records * RECORD_BYTES);
        assert_eq!(HotstartCodec::record_count(&rec), records);
    }
}

#[test]
fn round_trip_is_bit_exact_with_and_without_wetting_coefficient() {
    let mut rng = SmallRng::seed_from_u64(42);
    for flag in [WETTING_COEFFICIENT_FLAG, 2] {
        let mut rec = random_record(&mut rng, flag, 9, 4);
        rec.eta1[0] = -0.0;
        rec.u[3] = f64::MIN_POSITIVE;
        let bytes = HotstartCodec::encode(&rec).unwrap();
        let back = HotstartCodec::decode(&bytes, 9, 4).unwrap();
        assert_eq!(back.ch1.is_some(), flag == WETTING_COEFFICIENT_FLAG);
        assert_eq!(back.eta1[0].to_bits(), (-0.0f64).to_bits());
        assert_eq!(HotstartCodec::encode(&back).unwrap(), bytes);
        assert_eq!(back, rec);
    }
}

#[test]
fn integers_are_padded_to_eight_bytes() {
    let rec = HotstartRecord::zeroed(HotstartHeader {
        file_format_version: -2,
        model_flag: 10,
        nodes: 1,
        elements: 0,
        ..HotstartHeader::default()
    });
    let bytes = HotstartCodec::encode(&rec).unwrap();
    assert_eq!(&bytes[..8], &[0xfe, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    assert_eq!(&bytes[8..16], &[10, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn decode_rejects_wrong_counts_and_truncation() {
    let mut rng = SmallRng::seed_from_u64(3);
    let rec = random_record(&mut rng, WETTING_COEFFICIENT_FLAG, 5, 2);
    let bytes = HotstartCodec::encode(&rec).unwrap();

    assert!(matches!(
        HotstartCodec::decode(&bytes, 6, 2),
        Err(MeshRegridError::HotstartFormat(_))
    ));
    assert!(matches!(
        HotstartCodec::decode(&bytes[..bytes.len() - RECORD_BYTES], 5, 2),
        Err(MeshRegridError::HotstartFormat(_))
    ));
    let mut padded = bytes.to_vec();
    padded.extend_from_slice(&[0; RECORD_BYTES]);
    assert!(matches!(
        HotstartCodec::decode(&padded, 5, 2),
        Err(MeshRegridError::HotstartFormat(_))
    ));
}

#[test]
fn encode_rejects_arrays_disagreeing_with_header() {
    let mut rec = HotstartRecord::zeroed(HotstartHeader {
        nodes: 3,
        elements: 1,
        ..HotstartHeader::default()
    });
    rec.v.pop();
    assert!(HotstartCodec::encode(&rec).is_err());

    let mut rec = HotstartRecord::zeroed(HotstartHeader {
        nodes: 3,
        elements: 1,
        ..HotstartHeader::default()
    });
    rec.ch1 = Some(vec![0.0; 3]);
    assert!(HotstartCodec::encode(&rec).is_err());
}

#[test]
fn layout_writes_per_rank_and_global_files() {
    let dir = scratch_dir("hotstart-layout");
    let layout = PartitionLayout::new(&dir);
    let mut rng = SmallRng::seed_from_u64(11);

    let local = random_record(&mut rng, 0, 4, 2);
    let path = layout
        .write_hotstart(HotstartScope::Rank(1), &local, true)
        .unwrap();
    assert_eq!(path, dir.join("PE0001").join("fort.67"));
    let dump = fs::read_to_string(dir.join("PE0001").join("fort.txt")).unwrap();
    assert!(dump.starts_with("file_format_version = 1050624\n"));
    assert!(dump.contains("igpp = "));
    assert_eq!(
        layout.read_hotstart(HotstartScope::Rank(1), 4, 2).unwrap(),
        local
    );

    let mut global = random_record(&mut rng, WETTING_COEFFICIENT_FLAG, 6, 3);
    global.header.global_nodes = 6;
    global.header.global_elements = 3;
    assert!(global.is_global());
    layout
        .write_hotstart(HotstartScope::Global, &global, false)
        .unwrap();
    assert!(!dir.join("fort.txt").exists());
    assert_eq!(
        layout.read_hotstart(HotstartScope::Global, 6, 3).unwrap(),
        global
    );

    fs::remove_dir_all(&dir).unwrap();
}
