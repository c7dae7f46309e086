use anyhow::Result;
use clap::Parser;

use tfshuffle::{run_with_args, Args};
use tfshuffle_core::error::exit_code_of;
use tfshuffle_core::record::Record;
use tfshuffle_core::record_codec::{open_input, Compression, ShardStream, TfRecordWriter};
use tfshuffle_core::tool::setup_log;

#[test]
fn test_parse_args() -> Result<()> {
    setup_log();

    let args = Args::try_parse_from([
        "tfshuffle",
        "--input_pattern_list=a/*.gz,b/*.gz",
        "--output_pattern_prefix",
        "out/x",
        "--output_dataset_config_pbtxt=out/x.pbtxt",
        "--output_dataset_name=train",
        "--direct_num_workers=4",
        "--step",
        "-1",
        "--compression=none",
    ])?;

    let config = args.into_config()?;

    assert_eq!(config.patterns(), vec!["a/*.gz", "b/*.gz"]);
    assert_eq!(config.output_pattern_prefix, "out/x");
    assert_eq!(config.output_dataset_config.as_deref(), Some("out/x.pbtxt"));
    assert_eq!(config.direct_num_workers, 4);
    assert_eq!(config.step, -1);
    assert_eq!(config.compression, Compression::None);
    assert_eq!(config.seed, None);

    Ok(())
}

#[test]
fn test_command_line_overrides_config_file() -> Result<()> {
    setup_log();

    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("shuffle.toml");

    std::fs::write(
        &config_path,
        "input_pattern_list = \"in/*.gz\"\noutput_pattern_prefix = \"out/x\"\nstep = 100\ndirect_num_workers = 2\n",
    )?;

    let args = Args::try_parse_from([
        "tfshuffle",
        "--config",
        config_path.to_str().unwrap(),
        "--step=50",
        "--seed=9",
    ])?;

    let config = args.into_config()?;

    assert_eq!(config.input_pattern_list, "in/*.gz");
    assert_eq!(config.direct_num_workers, 2);
    assert_eq!(config.step, 50);
    assert_eq!(config.seed, Some(9));

    Ok(())
}

#[test]
fn test_missing_config_file_exits_with_config_status() {
    setup_log();

    let args = Args {
        config: Some("/no/such/shuffle.toml".to_string()),
        ..Default::default()
    };

    let err = run_with_args(args).unwrap_err();

    assert_eq!(exit_code_of(&err), 2);
}

#[test]
fn test_invalid_compression_rejected() {
    assert!(Args::try_parse_from(["tfshuffle", "--compression=lz4"]).is_err());
}

#[test]
fn test_run_with_args() -> Result<()> {
    setup_log();

    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.tfrecord.gz");

    let mut writer = TfRecordWriter::new(ShardStream::create(&input, Compression::Gzip)?);
    for i in 0..9 {
        writer.write_record(format!("record-{}", i).as_bytes())?;
    }
    writer.into_inner().finish()?;

    let prefix = dir.path().join("out");

    let args = Args {
        input_pattern_list: Some(input.to_string_lossy().to_string()),
        output_pattern_prefix: Some(prefix.to_string_lossy().to_string()),
        direct_num_workers: Some(3),
        step: Some(2),
        seed: Some(1),
        ..Default::default()
    };

    let report = run_with_args(args)?;
    assert_eq!(report.stats.total, 9);

    let mut written = Vec::new();
    for shard in &report.shards.shards {
        let records = open_input(&shard.filename, Compression::Gzip)?
            .collect::<Result<Vec<Record>>>()?;
        assert_eq!(records.len(), 3);
        written.extend(records);
    }

    written.sort();
    let mut expected: Vec<Record> = (0..9)
        .map(|i| Record::from(format!("record-{}", i).as_str()))
        .collect();
    expected.sort();

    assert_eq!(written, expected);

    Ok(())
}
