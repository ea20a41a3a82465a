mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipchop::adapters::{AppConfig, FfmpegExportAdapter, LocalFsAdapter, NativeProbeAdapter};
use clipchop::app::{
    AppContainer, DefaultAppContainer, InspectRequest, OutputPolicy, ReportFormat, TrimSession,
};
use clipchop::ports::ProbePort;
use clipchop::*;
use common::*;
use tempfile::TempDir;

fn keyframe_times(path: &Path) -> Result<Vec<TimeSpec>, DomainError> {
    let stream = NativeProbeAdapter::new().open_keyframes(path)?;
    let video = stream.info().video_stream;
    let mut times = Vec::new();
    for item in KeyframeIndex::new(video, stream) {
        times.push(item?.time);
    }
    Ok(times)
}

fn resolve(path: &Path, target: TimeSpec) -> Result<KeyframeTimestamp, DomainError> {
    let stream = NativeProbeAdapter::new().open_keyframes(path)?;
    let video = stream.info().video_stream;
    KeyframeResolver::resolve(target, KeyframeIndex::new(video, stream))
}

fn ms(millis: &[u64]) -> Vec<TimeSpec> {
    millis.iter().map(|m| TimeSpec::from_millis(*m)).collect()
}

fn container() -> DefaultAppContainer {
    DefaultAppContainer::new(&AppConfig::default()).unwrap()
}

fn policy() -> OutputPolicy {
    OutputPolicy {
        prefix: "Trimmed ".to_string(),
        extensions: vec!["mp4".to_string(), "mkv".to_string()],
        overwrite: false,
    }
}

mod mp4_index {
    use super::*;

    #[test]
    fn test_sync_sample_times() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());

        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 2000, 4040, 6100]));
    }

    #[test]
    fn test_container_info() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());

        let stream = NativeProbeAdapter::new().open_keyframes(&path).unwrap();
        let info = stream.info();
        assert_eq!(info.format, "mp4");
        assert_eq!(info.video_stream, 1);
        assert_eq!(info.video_codec.as_deref(), Some("avc1"));
        assert_eq!(info.stream_count, 2);
        assert_eq!(info.duration, Some(TimeSpec::from_millis(8000)));
    }

    #[test]
    fn test_resolution_scenarios() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());

        let between = resolve(&path, secs(3.0)).unwrap();
        assert_eq!(between.time, TimeSpec::from_millis(2000));
        assert_eq!(between.pts, 180_000);
        assert_eq!(between.stream, 1);

        let exact = resolve(&path, secs(4.04)).unwrap();
        assert_eq!(exact.time, TimeSpec::from_millis(4040));

        let past_last = resolve(&path, secs(7.9)).unwrap();
        assert_eq!(past_last.time, TimeSpec::from_millis(6100));

        let at_zero = resolve(&path, TimeSpec::ZERO).unwrap();
        assert_eq!(at_zero.time, TimeSpec::ZERO);
    }

    #[test]
    fn test_two_passes_agree() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());

        assert_eq!(keyframe_times(&path).unwrap(), keyframe_times(&path).unwrap());
        assert_eq!(
            resolve(&path, secs(5.0)).unwrap(),
            resolve(&path, secs(5.0)).unwrap()
        );
    }

    #[test]
    fn test_composition_offset_and_edit_list() {
        let dir = TempDir::new().unwrap();

        let mut video = Mp4Track::video(90_000, vec![(400, 1800)], Some(vec![1, 101, 203, 306]));
        video.ctts = vec![(400, 3600)];
        let shifted = write_file(dir.path(), "ctts.mp4", &build_mp4(&[video.clone()], 1000, 8000));
        assert_eq!(keyframe_times(&shifted).unwrap(), ms(&[40, 2040, 4080, 6140]));

        // The edit list starts presentation at the first composition time
        video.elst = vec![(8000, 3600)];
        let edited = write_file(dir.path(), "elst.mp4", &build_mp4(&[video], 1000, 8000));
        assert_eq!(keyframe_times(&edited).unwrap(), ms(&[0, 2000, 4040, 6100]));
    }

    #[test]
    fn test_start_before_first_keyframe() {
        let dir = TempDir::new().unwrap();
        let mut video = Mp4Track::video(90_000, vec![(400, 1800)], Some(vec![1, 101]));
        video.ctts = vec![(400, 3600)];
        let path = write_file(dir.path(), "late.mp4", &build_mp4(&[video], 1000, 8000));

        match resolve(&path, secs(0.01)) {
            Err(DomainError::NoPrecedingKeyframe { requested, first }) => {
                assert_eq!(requested, secs(0.01));
                assert_eq!(first, TimeSpec::from_millis(40));
            }
            other => panic!("expected NoPrecedingKeyframe, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_sync_table_means_every_sample() {
        let dir = TempDir::new().unwrap();
        let video = Mp4Track::video(1000, vec![(5, 500)], None);
        let path = write_file(dir.path(), "intra.mp4", &build_mp4(&[video], 1000, 2500));

        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 500, 1000, 1500, 2000]));
        assert_eq!(resolve(&path, secs(1.2)).unwrap().time, TimeSpec::from_millis(1000));
    }

    #[test]
    fn test_empty_sync_table_is_empty_index() {
        let dir = TempDir::new().unwrap();
        let video = Mp4Track::video(1000, vec![(5, 500)], Some(Vec::new()));
        let path = write_file(dir.path(), "empty.mp4", &build_mp4(&[video], 1000, 2500));

        assert!(keyframe_times(&path).unwrap().is_empty());
        assert!(matches!(resolve(&path, secs(1.0)), Err(DomainError::EmptyIndex)));
    }

    #[test]
    fn test_audio_only_has_no_video_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "audio.mp4", &build_mp4(&[Mp4Track::audio(1)], 1000, 2000));

        assert!(matches!(
            NativeProbeAdapter::new().open_keyframes(&path).err(),
            Some(DomainError::NoVideoStream { .. })
        ));
    }

    #[test]
    fn test_truncated_moov_is_demux_error() {
        let dir = TempDir::new().unwrap();
        let bytes = sample_mp4();
        // ftyp is 32 bytes; keep the moov header and part of its payload
        let path = write_file(dir.path(), "cut.mp4", &bytes[..200]);

        assert!(matches!(
            NativeProbeAdapter::new().open_keyframes(&path).err(),
            Some(DomainError::Demux(_))
        ));
    }

    #[test]
    fn test_mdat_only_is_demux_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "raw.mp4", &mp4_box(b"mdat", &[0u8; 32]));

        assert!(matches!(
            NativeProbeAdapter::new().open_keyframes(&path).err(),
            Some(DomainError::Demux(_))
        ));
    }
}

mod mkv_index {
    use super::*;

    #[test]
    fn test_simple_block_keyframes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());

        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 2000, 4040, 6100]));
    }

    #[test]
    fn test_container_info() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());

        let stream = NativeProbeAdapter::new().open_keyframes(&path).unwrap();
        let info = stream.info();
        assert_eq!(info.format, "matroska");
        assert_eq!(info.video_stream, 1);
        assert_eq!(info.video_codec.as_deref(), Some("V_MPEG4/ISO/AVC"));
        assert_eq!(info.stream_count, 2);
        assert_eq!(info.duration, Some(TimeSpec::from_millis(8000)));
    }

    #[test]
    fn test_resolution_scenarios() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());

        let between = resolve(&path, secs(3.0)).unwrap();
        assert_eq!(between.time, TimeSpec::from_millis(2000));
        assert_eq!(between.pts, 2000);
        assert_eq!(resolve(&path, secs(4.04)).unwrap().time, TimeSpec::from_millis(4040));
        assert_eq!(resolve(&path, secs(7.9)).unwrap().time, TimeSpec::from_millis(6100));
    }

    #[test]
    fn test_block_groups() {
        let dir = TempDir::new().unwrap();
        let clusters = vec![
            MkvCluster {
                timestamp: 0,
                blocks: vec![
                    MkvBlock::Group { track: 1, timecode: 0, referenced: false },
                    MkvBlock::Group { track: 1, timecode: 40, referenced: true },
                    MkvBlock::Group { track: 2, timecode: 60, referenced: false },
                    MkvBlock::Group { track: 1, timecode: 500, referenced: false },
                ],
            },
            MkvCluster {
                timestamp: 1000,
                blocks: vec![
                    MkvBlock::Simple { track: 1, timecode: 0, key: false },
                    MkvBlock::Group { track: 1, timecode: 250, referenced: false },
                ],
            },
        ];
        let spec = MkvSpec::new(video_and_audio_tracks(), clusters);
        let path = write_file(dir.path(), "groups.mkv", &build_mkv(&spec));

        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 500, 1250]));
    }

    #[test]
    fn test_unknown_sizes_and_webm() {
        let dir = TempDir::new().unwrap();
        let mut spec = sample_mkv_spec();
        spec.unknown_sizes = true;
        spec.doc_type = "webm";
        let path = write_file(dir.path(), "live.webm", &build_mkv(&spec));

        let stream = NativeProbeAdapter::new().open_keyframes(&path).unwrap();
        assert_eq!(stream.info().format, "webm");
        drop(stream);
        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 2000, 4040, 6100]));
    }

    #[test]
    fn test_timestamp_scale() {
        let dir = TempDir::new().unwrap();
        let mut spec = sample_mkv_spec();
        // 100 µs ticks: the same cluster timestamps land ten times earlier
        spec.timestamp_scale = Some(100_000);
        let path = write_file(dir.path(), "scaled.mkv", &build_mkv(&spec));

        assert_eq!(keyframe_times(&path).unwrap(), ms(&[0, 200, 404, 610]));
        let stream = NativeProbeAdapter::new().open_keyframes(&path).unwrap();
        assert_eq!(stream.info().duration, Some(TimeSpec::from_millis(800)));
    }

    #[test]
    fn test_unsupported_doc_type() {
        let dir = TempDir::new().unwrap();
        let mut spec = sample_mkv_spec();
        spec.doc_type = "notmatroska";
        let path = write_file(dir.path(), "odd.mkv", &build_mkv(&spec));

        assert!(matches!(
            NativeProbeAdapter::new().open_keyframes(&path).err(),
            Some(DomainError::Open { .. })
        ));
    }

    #[test]
    fn test_audio_only_has_no_video_stream() {
        let dir = TempDir::new().unwrap();
        let tracks = vec![MkvTrack {
            number: 1,
            track_type: 2,
            codec: "A_OPUS",
        }];
        let clusters = vec![MkvCluster {
            timestamp: 0,
            blocks: vec![MkvBlock::Simple { track: 1, timecode: 0, key: true }],
        }];
        let path = write_file(dir.path(), "audio.mka", &build_mkv(&MkvSpec::new(tracks, clusters)));

        assert!(matches!(
            NativeProbeAdapter::new().open_keyframes(&path).err(),
            Some(DomainError::NoVideoStream { .. })
        ));
    }

    #[test]
    fn test_truncated_cluster_fails_lazily() {
        let dir = TempDir::new().unwrap();
        let bytes = sample_mkv();
        let path = write_file(dir.path(), "cut.mkv", &bytes[..bytes.len() - 10]);

        // Resolution stops at the first keyframe past the target and never reaches the cut
        assert_eq!(resolve(&path, secs(1.0)).unwrap().time, TimeSpec::ZERO);
        assert!(matches!(keyframe_times(&path), Err(DomainError::Demux(_))));
    }
}

mod probe_errors {
    use super::*;

    #[test]
    fn test_text_file_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.mp4", b"this is not a video file at all\n");

        match NativeProbeAdapter::new().open_keyframes(&path).err() {
            Some(DomainError::Open { reason, .. }) => {
                assert!(reason.contains("unrecognized container format"));
            }
            other => panic!("expected Open error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let result = NativeProbeAdapter::new().open_keyframes(Path::new("/no/such/file.mkv"));
        assert!(matches!(result.err(), Some(DomainError::Open { .. })));
    }
}

mod app_flow {
    use super::*;

    #[test]
    fn test_resolve_through_container() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(3.0), secs(5.0)).unwrap();
        let resolved = trim.resolve(&request).unwrap();
        assert_eq!(resolved.start, TimeSpec::from_millis(2000));
        assert_eq!(resolved.requested_start, secs(3.0));
        assert_eq!(resolved.start_shift(), TimeSpec::from_millis(1000));
        assert_eq!(resolved.copy_duration(), TimeSpec::from_millis(3000));
    }

    #[test]
    fn test_stop_past_end_is_clamped() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(4.5), secs(20.0)).unwrap();
        let resolved = trim.resolve(&request).unwrap();
        assert_eq!(resolved.start, TimeSpec::from_millis(4040));
        assert_eq!(resolved.stop, TimeSpec::from_millis(8000));
    }

    #[test]
    fn test_start_past_end_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(9.0), secs(10.0)).unwrap();
        assert!(matches!(
            trim.resolve(&request),
            Err(DomainError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_session_builds_request_from_container_duration() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let trim = container().trim_interactor();
        let info = trim.container_info(&path).unwrap();

        let mut session = TrimSession::new();
        session.load(&path, info.duration);
        session.set_start(secs(6.5)).unwrap();
        let request = session.trim_request().unwrap();
        assert_eq!(request.stop, TimeSpec::from_millis(8000));

        let resolved = trim.resolve(&request).unwrap();
        assert_eq!(resolved.start, TimeSpec::from_millis(6100));
    }

    #[tokio::test]
    async fn test_resolve_selection_defaults_stop_to_end() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());
        let trim = container().trim_interactor();

        let resolved = trim
            .resolve_selection_blocking(path.clone(), secs(6.5), None)
            .await
            .unwrap();
        assert_eq!(resolved.source, path);
        assert_eq!(resolved.start, TimeSpec::from_millis(6100));
        assert_eq!(resolved.stop, TimeSpec::from_millis(8000));

        assert!(matches!(
            trim.resolve_selection(&path, secs(8.0), None),
            Err(DomainError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_resolve() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(2.5), secs(3.0)).unwrap();
        let resolved = trim.resolve_blocking(request).await.unwrap();
        assert_eq!(resolved.start, TimeSpec::from_millis(2000));
    }

    #[tokio::test]
    async fn test_blocking_resolve_maps_domain_errors() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.mkv", b"plain text, not a container");
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(0.0), secs(1.0)).unwrap();
        assert!(matches!(
            trim.resolve_blocking(request).await,
            Err(ClipChopError::Domain(DomainError::Open { .. }))
        ));
    }

    #[test]
    fn test_export_plan() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(3.0), secs(5.0)).unwrap();
        let resolved = trim.resolve(&request).unwrap();
        let plan = trim.plan_export(resolved, None, &policy()).unwrap();

        assert_eq!(plan.output, dir.path().join("Trimmed sample.mp4"));
        let command = plan.command.join(" ");
        assert!(command.starts_with("ffmpeg -ss 2.000000 -i "));
        assert!(command.contains("-to 3.000000"));
        assert!(command.contains("-c:v copy -c:a copy -map 0 -n"));
    }

    #[test]
    fn test_export_plan_rejects_existing_output_and_input() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let existing = write_file(dir.path(), "taken.mp4", b"");
        let trim = container().trim_interactor();

        let request = TrimRequest::new(&path, secs(3.0), secs(5.0)).unwrap();
        let resolved = trim.resolve(&request).unwrap();

        let err = trim
            .plan_export(resolved.clone(), Some(existing.clone()), &policy())
            .unwrap_err();
        assert!(matches!(err, ClipChopError::Export { .. }));

        let mut overwrite = policy();
        overwrite.overwrite = true;
        assert!(trim.plan_export(resolved.clone(), Some(existing), &overwrite).is_ok());
        assert!(trim.plan_export(resolved.clone(), Some(path), &overwrite).is_err());
        assert!(trim
            .plan_export(resolved, Some(dir.path().join("clip.avi")), &overwrite)
            .is_err());
    }

    #[tokio::test]
    async fn test_export_reports_missing_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mp4", &sample_mp4());
        let container = DefaultAppContainer::with_ports(
            Arc::new(NativeProbeAdapter::new()),
            Arc::new(FfmpegExportAdapter::new("/no/such/ffmpeg", false)),
            Arc::new(LocalFsAdapter::new()),
        );
        let trim = container.trim_interactor();

        let request = TrimRequest::new(&path, secs(3.0), secs(5.0)).unwrap();
        let resolved = trim.resolve(&request).unwrap();
        let plan = trim.plan_export(resolved, None, &policy()).unwrap();
        assert!(matches!(
            trim.export(&plan).await,
            Err(ClipChopError::Export { .. })
        ));
    }

    #[test]
    fn test_keyframe_report() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "sample.mkv", &sample_mkv());

        let response = container()
            .inspect_interactor()
            .keyframes(&InspectRequest {
                input: path,
                limit: None,
                format: ReportFormat::Json,
            })
            .unwrap();
        assert_eq!(response.report.summary.keyframe_count, 4);
        assert_eq!(response.report.summary.min_interval, Some(TimeSpec::from_millis(2000)));
        assert_eq!(response.report.summary.max_interval, Some(TimeSpec::from_millis(2060)));

        let json: serde_json::Value = serde_json::from_str(&response.rendered).unwrap();
        assert_eq!(json["container"]["format"], "matroska");
        assert_eq!(json["keyframes"][2]["pts"], 4040);
    }

    #[test]
    fn test_list_media() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "b.MKV", &sample_mkv());
        write_file(dir.path(), "a.mp4", &sample_mp4());
        write_file(dir.path(), "notes.txt", b"text");
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = container()
            .inspect_interactor()
            .list_media(dir.path(), &AppConfig::default().library.extensions)
            .unwrap();
        let names: Vec<PathBuf> = files
            .iter()
            .filter_map(|f| f.file_name().map(PathBuf::from))
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.mp4"), PathBuf::from("b.MKV")]);
    }
}
