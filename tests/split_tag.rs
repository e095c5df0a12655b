use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rust_htslib::bam;
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::{Aux, Cigar, CigarString, Record as BamRecord};
use rust_htslib::bam::Read;
use sprs::TriMat;

use scsplit::command::{SplitTag, SplitTagParams};
use scsplit::fileformat::{CountMatrix, Features, SeqType};

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// 3 features x 6 barcodes; b6 has no tag
fn write_matrix(dir: &Path) -> CountMatrix {
    let features = Features::new(strings(&["G1", "G2", "G3"]), None, None).unwrap();
    let mut tri = TriMat::new((3, 6));
    for j in 0..6 {
        tri.add_triplet(j % 3, j, (j + 1) as u32);
    }
    let m = CountMatrix::new(
        Arc::new(features),
        strings(&["b1", "b2", "b3", "b4", "b5", "b6"]),
        tri.to_csc(),
    )
    .unwrap();
    m.to_matrix_dir(dir.join("match").join("outs").join("filtered"))
        .unwrap();
    m
}

fn write_tags(dir: &Path) -> std::path::PathBuf {
    let p = dir.join("umi_tag.tsv");
    std::fs::write(
        &p,
        "barcode\tCLindex_1\ttag\nb1\t5\tt1\nb3\t6\tt1\nb2\t7\tt2\nb4\t8\tt2\nb5\t9\tt2\nb9\t1\tt2\n",
    )
    .unwrap();
    p
}

fn write_bam(path: &Path, barcodes: &[Option<&str>]) {
    let mut header = bam::Header::new();
    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 10000);
    header.push_record(&sq);

    let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam).unwrap();
    for (i, bc) in barcodes.iter().enumerate() {
        let mut rec = BamRecord::new();
        let cigar = CigarString(vec![Cigar::Match(4)]);
        rec.set(format!("read{}", i).as_bytes(), Some(&cigar), b"ACGT", &[30; 4]);
        rec.set_tid(0);
        rec.set_pos(10 * i as i64);
        rec.set_mtid(-1);
        rec.set_mpos(-1);
        if let Some(bc) = bc {
            rec.push_aux(b"CB", Aux::String(bc)).unwrap();
        }
        writer.write(&rec).unwrap();
    }
}

fn count_bam_records(path: &Path) -> Vec<String> {
    let mut reader = bam::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| String::from_utf8(r.unwrap().qname().to_vec()).unwrap())
        .collect()
}

fn fastq_names(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .step_by(4)
        .map(|l| l.trim_start_matches('@').to_string())
        .collect()
}

#[test]
fn test_split_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let m = write_matrix(dir.path());
    let out = dir.path().join("out");

    let report = SplitTag::run(&SplitTagParams {
        path_umi_tag: write_tags(dir.path()),
        path_out: out.clone(),
        split_matrix: true,
        path_match_dir: Some(dir.path().join("match")),
        ..Default::default()
    })
    .unwrap();

    let expected: BTreeMap<String, usize> =
        [("t1".to_string(), 2), ("t2".to_string(), 3)].into_iter().collect();
    assert_eq!(report.matrix, Some(expected));

    let t1 = CountMatrix::from_matrix_dir(out.join("matrix").join("t1_filtered")).unwrap();
    assert_eq!(t1.barcodes(), &strings(&["b1", "b3"])[..]);
    assert_eq!(t1.shape(), (3, 2));
    assert_eq!(t1.matrix().get(0, 0), Some(&1));
    assert_eq!(t1.matrix().get(2, 1), Some(&3));

    let t2 = CountMatrix::from_matrix_dir(out.join("matrix").join("t2_filtered")).unwrap();
    assert_eq!(t2.barcodes(), &strings(&["b2", "b4", "b5"])[..]);
    assert_eq!(t2.features().gene_id(), m.features().gene_id());
    assert_eq!(t2.matrix().get(1, 2), Some(&5));
}

#[test]
fn test_split_bam() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bam");
    write_bam(
        &input,
        &[Some("b1"), Some("b2"), None, Some("b6"), Some("b5"), Some("b3")],
    );
    let out = dir.path().join("out");

    let report = SplitTag::run(&SplitTagParams {
        path_umi_tag: write_tags(dir.path()),
        path_out: out.clone(),
        split_bam: true,
        path_bam: Some(input),
        ..Default::default()
    })
    .unwrap();

    let stats = report.bam.unwrap();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.written.get("t1"), Some(&2));
    assert_eq!(stats.written.get("t2"), Some(&2));
    assert_eq!(
        stats.written.values().sum::<u64>() + stats.dropped,
        stats.total
    );

    assert_eq!(
        count_bam_records(&out.join("bam").join("t1.bam")),
        strings(&["read0", "read5"])
    );
    assert_eq!(
        count_bam_records(&out.join("bam").join("t2.bam")),
        strings(&["read1", "read4"])
    );
}

#[test]
fn test_split_fastq() {
    let dir = tempfile::tempdir().unwrap();
    let barcode_dir = dir.path().join("match").join("01.barcode");
    std::fs::create_dir_all(&barcode_dir).unwrap();
    std::fs::write(
        barcode_dir.join("sample_2.fq"),
        "@b1_AAAA_1\nACGT\n+\nIIII\n\
         @b2_CCCC_2\nACGT\n+\nIIII\n\
         @b6_GGGG_3\nACGT\n+\nIIII\n\
         @b3_TTTT_4\nACGT\n+\nIIII\n",
    )
    .unwrap();
    let r1a = dir.path().join("lane1_R1.fq");
    let r1b = dir.path().join("lane2_R1.fq");
    std::fs::write(&r1a, "@p1\nAAAA\n+\nIIII\n@p2\nCCCC\n+\nIIII\n").unwrap();
    std::fs::write(&r1b, "@p3\nGGGG\n+\nIIII\n@p4\nTTTT\n+\nIIII\n").unwrap();
    let out = dir.path().join("out");

    let report = SplitTag::run(&SplitTagParams {
        path_umi_tag: write_tags(dir.path()),
        path_out: out.clone(),
        split_fastq: true,
        path_match_dir: Some(dir.path().join("match")),
        r1_read: Some(format!("{},{}", r1a.display(), r1b.display())),
        ..Default::default()
    })
    .unwrap();

    let stats = report.fastq.unwrap();
    assert_eq!(stats.r2_total, 4);
    assert_eq!(stats.r1_total, 4);

    let fastqs = out.join("fastqs");
    assert_eq!(
        fastq_names(&fastqs.join("t1_2.fq")),
        strings(&["b1_AAAA_1", "b3_TTTT_4"])
    );
    assert_eq!(fastq_names(&fastqs.join("t1_1.fq")), strings(&["p1", "p4"]));
    assert_eq!(fastq_names(&fastqs.join("t2_2.fq")), strings(&["b2_CCCC_2"]));
    assert_eq!(fastq_names(&fastqs.join("t2_1.fq")), strings(&["p2"]));
}

#[test]
fn test_split_fastq_pairs_by_read_index() {
    let dir = tempfile::tempdir().unwrap();
    let barcode_dir = dir.path().join("match").join("01.barcode");
    std::fs::create_dir_all(&barcode_dir).unwrap();
    //Only reads of valid cells are kept in R2, so indices have gaps. Index 5 appears twice
    std::fs::write(
        barcode_dir.join("sample_2.fq"),
        "@b1_AAAA_2\nACGT\n+\nIIII\n\
         @b3_CCCC_5\nACGT\n+\nIIII\n\
         @b3_GGGG_5\nACGT\n+\nIIII\n",
    )
    .unwrap();
    let r1 = dir.path().join("R1.fq.gz");
    {
        use std::io::Write;
        let mut w = flate2::write::GzEncoder::new(
            std::fs::File::create(&r1).unwrap(),
            flate2::Compression::default(),
        );
        for i in 1..=5 {
            write!(w, "@p{}\nAAAA\n+\nIIII\n", i).unwrap();
        }
        w.finish().unwrap();
    }
    let out = dir.path().join("out");

    let report = SplitTag::run(&SplitTagParams {
        path_umi_tag: write_tags(dir.path()),
        path_out: out.clone(),
        split_fastq: true,
        path_match_dir: Some(dir.path().join("match")),
        r1_read: Some(r1.display().to_string()),
        ..Default::default()
    })
    .unwrap();

    let stats = report.fastq.unwrap();
    assert_eq!(stats.r2_total, 3);
    assert_eq!(stats.r1_total, 5);
    assert_eq!(stats.r1_written.get("t1"), Some(&2));

    let fastqs = out.join("fastqs");
    assert_eq!(
        fastq_names(&fastqs.join("t1_2.fq")),
        strings(&["b1_AAAA_2", "b3_CCCC_5", "b3_GGGG_5"])
    );
    assert_eq!(fastq_names(&fastqs.join("t1_1.fq")), strings(&["p2", "p5"]));
    assert!(fastq_names(&fastqs.join("t2_1.fq")).is_empty());
}

#[test]
fn test_split_vdj() {
    let dir = tempfile::tempdir().unwrap();
    let vdj_dir = dir.path().join("vdj").join("03.count_vdj");
    std::fs::create_dir_all(&vdj_dir).unwrap();
    std::fs::write(
        vdj_dir.join("sample_cell_confident.tsv"),
        "barcode\tchain\taaSeqCDR3\tnSeqCDR3\n\
         b1\tTRB\tCASS\tTGTGCC\n\
         b1\tTRA\tCAV\tTGTGCT\n\
         b3\tTRB\tCASS\tTGTGCC\n\
         b7\tTRB\tCASQ\tTGTGCA\n",
    )
    .unwrap();
    let out = dir.path().join("out");

    let report = SplitTag::run(&SplitTagParams {
        path_umi_tag: write_tags(dir.path()),
        path_out: out.clone(),
        split_vdj: true,
        path_vdj_dir: Some(dir.path().join("vdj")),
        ..Default::default()
    })
    .unwrap();

    let seq_types = report.vdj.unwrap();
    assert_eq!(seq_types.get("t1"), Some(&SeqType::TCR));
    assert_eq!(seq_types.get("t2"), None);

    let vdj_out = out.join("vdj");
    let cells = std::fs::read_to_string(vdj_out.join("t1_TCR_cell_confident.tsv")).unwrap();
    assert_eq!(cells.lines().count(), 4);
    assert!(!vdj_out.join("t2_TCR_cell_confident.tsv").exists());

    let clonotypes = std::fs::read_to_string(vdj_out.join("t1_TCR_clonotypes.tsv")).unwrap();
    let lines: Vec<&str> = clonotypes.lines().collect();
    assert_eq!(
        lines,
        vec![
            "clonetype_ID\tTRA_aaSeqCDR3\tTRA_nSeqCDR3\tTRB_aaSeqCDR3\tTRB_nSeqCDR3\tbarcode_count\tpercent",
            "1\tCAV\tTGTGCT\tCASS\tTGTGCC\t1\t0.5",
            "2\tNaN\tNaN\tCASS\tTGTGCC\t1\t0.5",
        ]
    );
}

#[test]
fn test_missing_tag_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bam");
    write_bam(&input, &[Some("b1")]);

    let result = SplitTag::run(&SplitTagParams {
        path_umi_tag: dir.path().join("missing.tsv"),
        path_out: dir.path().join("out"),
        split_bam: true,
        path_bam: Some(input),
        ..Default::default()
    });
    assert!(result.is_err());
}
