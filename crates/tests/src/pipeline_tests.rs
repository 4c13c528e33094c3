use std::sync::Arc;
use std::time::Duration;

use shorts_config::SubtitleMode;
use shorts_services::{JobError, JobStatus};
use shorts_timeline::{Segment, Transcript, Word};
use tokio::sync::Semaphore;

use crate::fixtures::fakes::{FailAt, FakeGeneration, MemoryStorage, sample_transcript};
use crate::fixtures::pipeline::TestPipeline;

async fn assert_cleaned(pipeline: &TestPipeline, id: &str) {
    let dir = pipeline.job_dir(id);
    for _ in 0..100 {
        if !dir.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("work dir {} was not removed", dir.display());
}

#[tokio::test]
async fn empty_prompt_is_rejected_without_creating_a_job() {
    let pipeline = TestPipeline::new(FakeGeneration::default());

    for prompt in ["", "   \n\t"] {
        let err = pipeline.orchestrator.submit(prompt).unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }
    assert!(pipeline.orchestrator.store().is_empty());
    assert!(pipeline.generation.calls().is_empty());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let err = pipeline.orchestrator.get_status("nope").unwrap_err();
    assert!(matches!(err, JobError::NotFound(id) if id == "nope"));
}

#[tokio::test]
async fn submitted_job_is_immediately_visible_and_running() {
    let gate = Arc::new(Semaphore::new(0));
    let pipeline = TestPipeline::new(FakeGeneration::gated(gate.clone()));

    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    let view = pipeline.orchestrator.get_status(&id).unwrap();
    assert_eq!(view.id, id);
    assert!(!view.status.is_terminal());
    assert!(view.url.is_empty());

    gate.add_permits(1);
    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Completed);
}

#[tokio::test]
async fn successful_job_uploads_and_shares() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Completed, "error: {:?}", view.error);
    assert_eq!(view.error, None);

    let key = format!("shorts/generated_short_{id}.mp4");
    assert!(view.url.starts_with(&format!("https://storage.test/shorts-test/{key}?")));
    assert!(view.url.contains("X-Amz-Expires=43200&X-Amz-Signature=sig"));
    assert!(!view.url.contains("\\u0026"));

    let object = pipeline.storage.object("shorts-test", &key).unwrap();
    assert_eq!(object.content_type, "video/mp4");
    assert_eq!(object.size, object.bytes.len() as u64);
    assert!(pipeline.storage.buckets.lock().unwrap().contains("shorts-test"));

    assert_eq!(
        pipeline.generation.calls(),
        vec!["script", "voice", "transcription", "images", "images", "images", "images"]
    );

    assert_cleaned(&pipeline, &id).await;
}

#[tokio::test]
async fn successful_job_enters_every_stage_once_in_order() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    pipeline.wait_terminal(&id).await;

    let job = pipeline.orchestrator.store().get(&id).unwrap();
    assert_eq!(
        job.history,
        vec![
            JobStatus::Initialized,
            JobStatus::ConnectingToStorage,
            JobStatus::CreatingGenerationService,
            JobStatus::GeneratingScript,
            JobStatus::GeneratingVoice,
            JobStatus::GeneratingTranscription,
            JobStatus::GeneratingImages,
            JobStatus::CreatingSubtitleFile,
            JobStatus::CreatingVideoFromImages,
            JobStatus::AddingAudioToVideo,
            JobStatus::PreparingFileForUpload,
            JobStatus::Uploading,
            JobStatus::GeneratingShareUrl,
            JobStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn failed_job_history_stops_at_the_failing_stage() {
    let pipeline = TestPipeline::new(FakeGeneration::failing_at(FailAt::Transcription));
    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    pipeline.wait_terminal(&id).await;

    let job = pipeline.orchestrator.store().get(&id).unwrap();
    assert_eq!(
        job.history,
        vec![
            JobStatus::Initialized,
            JobStatus::ConnectingToStorage,
            JobStatus::CreatingGenerationService,
            JobStatus::GeneratingScript,
            JobStatus::GeneratingVoice,
            JobStatus::GeneratingTranscription,
            JobStatus::Failed,
        ]
    );
}

#[tokio::test]
async fn unaligned_words_do_not_fail_the_job() {
    let generation = FakeGeneration {
        transcript: Transcript {
            segments: vec![Segment {
                start: 0.0,
                end: 4.0,
                text: "born in 1969".to_string(),
                words: vec![
                    Word {
                        start: Some(0.2),
                        end: Some(1.0),
                        text: "born".to_string(),
                        confidence: 0.9,
                    },
                    Word {
                        start: Some(1.2),
                        end: Some(1.6),
                        text: "in".to_string(),
                        confidence: 0.9,
                    },
                    Word {
                        start: None,
                        end: None,
                        text: "1969".to_string(),
                        confidence: 0.0,
                    },
                ],
            }],
        },
        ..FakeGeneration::default()
    };
    let pipeline = TestPipeline::new(generation);
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Completed, "error: {:?}", view.error);
    let seen = pipeline.renderer.subtitles_seen.lock().unwrap().clone();
    assert!(seen[0].contains("{\\k100}born {\\k40}in {\\k240}1969"), "{}", seen[0]);
}

#[tokio::test]
async fn images_follow_the_narration_timeline() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    pipeline.wait_terminal(&id).await;

    let composed = pipeline.renderer.composed.lock().unwrap().clone();
    assert_eq!(composed.len(), 1);
    let call = &composed[0];
    let stamps: Vec<f64> = call.images.iter().map(|i| i.timestamp).collect();
    assert_eq!(stamps, vec![0.0, 10.0, 20.0, 30.0]);
    assert_eq!(call.per_image_secs, 10.0);
    assert_eq!(call.canvas.width, 1080);
    assert_eq!(call.canvas.height, 1920);
    assert!(call.images.iter().all(|i| !i.url.is_empty()));
}

#[tokio::test]
async fn subtitles_carry_karaoke_timing() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    pipeline.wait_terminal(&id).await;

    let seen = pipeline.renderer.subtitles_seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let ass = &seen[0];
    assert!(ass.contains("[V4+ Styles]"));
    let dialogue: Vec<&str> = ass.lines().filter(|l| l.starts_with("Dialogue:")).collect();
    assert_eq!(dialogue.len(), 4);
    assert!(dialogue[0].starts_with("Dialogue: 0,0:00:00.00,0:00:09.00,Default,,0000,0000,0000,,"));
    assert!(dialogue[0].contains("{\\k200}Once"));
    assert!(dialogue[3].starts_with("Dialogue: 0,0:00:32.00,0:00:40.00,Default"));
}

#[tokio::test]
async fn word_mode_writes_one_cue_per_word() {
    let pipeline = TestPipeline::build(
        FakeGeneration::default(),
        MemoryStorage::default(),
        SubtitleMode::Word,
    );
    let id = pipeline.orchestrator.submit("a dragon").unwrap();
    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Completed);

    let seen = pipeline.renderer.subtitles_seen.lock().unwrap().clone();
    let dialogue: Vec<&str> = seen[0].lines().filter(|l| l.starts_with("Dialogue:")).collect();
    let words: usize = sample_transcript().segments.iter().map(|s| s.words.len()).sum();
    assert_eq!(dialogue.len(), words);
    assert!(dialogue[1].starts_with("Dialogue: 0,0:00:02.40,0:00:04.20,Default"));
}

#[tokio::test]
async fn transcription_failure_fails_the_job() {
    let pipeline = TestPipeline::new(FakeGeneration::failing_at(FailAt::Transcription));
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.url.is_empty());
    let error = view.error.unwrap();
    assert!(error.starts_with("generating_transcription: "), "{error}");
    assert!(error.contains("transcription exploded"));

    assert_eq!(pipeline.generation.calls(), vec!["script", "voice", "transcription"]);
    assert!(pipeline.storage.objects.lock().unwrap().is_empty());
    assert!(pipeline.renderer.composed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_before_generation() {
    let generation = FakeGeneration {
        api_key_missing: true,
        ..FakeGeneration::default()
    };
    let pipeline = TestPipeline::new(generation);
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().starts_with("creating_generation_service: "));
    assert!(pipeline.generation.calls().is_empty());
}

#[tokio::test]
async fn upload_failure_still_cleans_up() {
    let storage = MemoryStorage {
        fail_put: true,
        ..MemoryStorage::default()
    };
    let pipeline = TestPipeline::build(FakeGeneration::default(), storage, SubtitleMode::Segment);
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().starts_with("uploading: "));
    assert!(view.url.is_empty());
    assert_cleaned(&pipeline, &id).await;
}

#[tokio::test]
async fn empty_transcript_is_a_data_error() {
    let generation = FakeGeneration {
        transcript: Transcript::default(),
        ..FakeGeneration::default()
    };
    let pipeline = TestPipeline::new(generation);
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().starts_with("generating_transcription: "));
    assert!(!pipeline.generation.calls().contains(&"images".to_string()));
}

#[tokio::test]
async fn out_of_order_words_fail_subtitle_stage() {
    let word = |start: f64, end: f64, text: &str| Word {
        start: Some(start),
        end: Some(end),
        text: text.to_string(),
        confidence: 1.0,
    };
    let generation = FakeGeneration {
        transcript: Transcript {
            segments: vec![Segment {
                start: 0.0,
                end: 6.0,
                text: "backwards words".to_string(),
                words: vec![word(3.0, 5.0, "backwards"), word(1.0, 2.0, "words")],
            }],
        },
        ..FakeGeneration::default()
    };
    let pipeline = TestPipeline::new(generation);
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().starts_with("creating_subtitle_file: "));
    assert!(pipeline.renderer.composed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn terminal_jobs_ignore_further_updates() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let done = pipeline.orchestrator.submit("a dragon").unwrap();
    pipeline.wait_terminal(&done).await;

    let store = pipeline.orchestrator.store();
    assert_eq!(store.update(&done, |job| job.advance(JobStatus::Uploading)), Some(false));
    assert_eq!(store.update(&done, |job| job.fail("late".to_string())), Some(false));
    let view = pipeline.orchestrator.get_status(&done).unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.error, None);

    let failing = TestPipeline::new(FakeGeneration::failing_at(FailAt::Voice));
    let failed = failing.orchestrator.submit("a dragon").unwrap();
    let before = failing.wait_terminal(&failed).await;
    let store = failing.orchestrator.store();
    assert_eq!(store.update(&failed, |job| job.complete("https://x".to_string())), Some(false));
    assert_eq!(failing.orchestrator.get_status(&failed).unwrap(), before);
}

#[tokio::test]
async fn concurrent_jobs_progress_independently() {
    let pipeline = TestPipeline::new(FakeGeneration::default());
    let (a, b) = tokio::join!(
        async { pipeline.orchestrator.submit("first story").unwrap() },
        async { pipeline.orchestrator.submit("second story").unwrap() },
    );
    assert_ne!(a, b);

    let (va, vb) = tokio::join!(pipeline.wait_terminal(&a), pipeline.wait_terminal(&b));
    assert_eq!(va.status, JobStatus::Completed);
    assert_eq!(vb.status, JobStatus::Completed);
    assert_ne!(va.url, vb.url);
    assert_eq!(pipeline.storage.objects.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn shutdown_cancels_running_jobs() {
    let gate = Arc::new(Semaphore::new(0));
    let pipeline = TestPipeline::new(FakeGeneration::gated(gate));
    let id = pipeline.orchestrator.submit("a dragon").unwrap();

    pipeline.orchestrator.shutdown();

    let view = pipeline.wait_terminal(&id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().contains("cancelled"));
    assert!(pipeline.storage.objects.lock().unwrap().is_empty());
}
