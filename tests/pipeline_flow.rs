// 该文件是 HiMa 项目的一部分。
// tests/pipeline_flow.rs - 检测、对话与播客流程测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod common;

use image::{Rgb, RgbImage};

use common::{MP3_SAMPLE_RATE, MockModel, MockSpeech, SAMPLE_RATE, context};
use hima::{
  frame::WorkingFrame,
  model::{DetectionRequest, HarmBlockThreshold, HarmCategory, Part},
  output::{SaveAudioFileOutput, SaveImageFileOutput, palette_color},
  pipeline::{BOUNDING_BOX_SYSTEM_INSTRUCTION, NarrationError, PODCAST_SYSTEM_INSTRUCTION},
  speech::AudioFormat,
  task::{AskTask, DetectTask, NarrateTask, SessionTask, Task},
  transcript::{Speaker, Transcript},
};

const BOTTLE_REPLY: &str = "```json\n[{\"box_2d\": [100, 200, 300, 400], \"label\": \"bottle\"}]\n```";

fn nursery_photo() -> RgbImage {
  RgbImage::from_pixel(2000, 1000, Rgb([240, 240, 240]))
}

#[test]
fn detection_draws_bottle_on_working_frame() {
  let ctx = context(MockModel::new().reply(BOTTLE_REPLY), MockSpeech::new());
  let baseline = WorkingFrame::from_image(&nursery_photo()).unwrap();

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the bottles"));

  assert!(!outcome.is_degraded());
  assert_eq!(outcome.diagnostic(), BOTTLE_REPLY);
  assert_eq!(outcome.boxes().len(), 1);
  assert_eq!(outcome.boxes()[0].label, "bottle");

  let image = outcome.image();
  assert_eq!(image.dimensions(), (1024, 512));
  let red = palette_color(0);
  assert_eq!(*image.get_pixel(204, 51), red);
  assert_eq!(*image.get_pixel(409, 153), red);
  assert_eq!(*image.get_pixel(207, 54), red);
  // 线宽 4 像素，第五层不再着色
  assert_eq!(*image.get_pixel(208, 55), *baseline.image().get_pixel(208, 55));
  assert_eq!(*image.get_pixel(300, 100), *baseline.image().get_pixel(300, 100));
  assert_eq!(*image.get_pixel(0, 0), *baseline.image().get_pixel(0, 0));
}

#[test]
fn detection_request_carries_image_and_settings() {
  let ctx = context(MockModel::new().reply(BOTTLE_REPLY), MockSpeech::new());
  ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the bottles"));

  let requests = ctx.model.requests();
  assert_eq!(requests.len(), 1);
  let request = &requests[0];
  assert_eq!(request.temperature, Some(0.5));
  assert_eq!(
    request.system_instruction.as_deref(),
    Some(BOUNDING_BOX_SYSTEM_INSTRUCTION)
  );
  assert_eq!(request.safety_settings.len(), 1);
  assert_eq!(request.safety_settings[0].category, HarmCategory::DangerousContent);
  assert_eq!(
    request.safety_settings[0].threshold,
    HarmBlockThreshold::BlockOnlyHigh
  );
  assert!(!request.google_search);
  assert_eq!(request.prompt_text(), "Find the bottles");
  match &request.parts[1] {
    Part::InlineData { mime_type, data } => {
      assert_eq!(mime_type, "image/jpeg");
      assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }
    other => panic!("unexpected part: {:?}", other),
  }
}

#[test]
fn empty_detection_returns_unmarked_frame() {
  let ctx = context(MockModel::new().reply("```json\n[]\n```"), MockSpeech::new());
  let baseline = WorkingFrame::from_image(&nursery_photo()).unwrap();

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the bottles"));

  assert!(outcome.is_degraded());
  assert!(outcome.diagnostic().contains("No bounding boxes returned."));
  assert!(outcome.boxes().is_empty());
  assert_eq!(outcome.image(), baseline.image());
}

#[test]
fn unparsable_reply_counts_as_zero_detections() {
  let ctx = context(
    MockModel::new().reply("I see a bottle near the crib."),
    MockSpeech::new(),
  );
  let baseline = WorkingFrame::from_image(&nursery_photo()).unwrap();

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the bottles"));

  assert!(!outcome.is_degraded());
  assert!(outcome.boxes().is_empty());
  assert_eq!(outcome.diagnostic(), "I see a bottle near the crib.");
  assert_eq!(outcome.image(), baseline.image());
}

#[test]
fn session_chat_is_grounded_on_unparsable_reply() {
  let ctx = context(
    MockModel::new()
      .reply("I see a bottle near the crib.")
      .reply("It looks safe."),
    MockSpeech::new(),
  );

  let report = SessionTask::default()
    .with_questions(vec!["Is it safe".to_string()])
    .run_task(DetectionRequest::new(nursery_photo(), "Find the bottles"), &ctx)
    .unwrap();

  assert_eq!(report.transcript.len(), 2);
  let requests = ctx.model.requests();
  assert_eq!(
    requests[1].prompt_text(),
    "Is it safe. Objects detected: I see a bottle near the crib."
  );
}

#[test]
fn upstream_failure_degrades() {
  let ctx = context(MockModel::new().fail("quota exceeded"), MockSpeech::new());

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the bottles"));

  assert!(outcome.is_degraded());
  assert_eq!(
    outcome.diagnostic(),
    "Error: upstream call failed: mock upstream: quota exceeded"
  );
}

#[test]
fn empty_image_degrades_without_calling_model() {
  let ctx = context(MockModel::new().reply(BOTTLE_REPLY), MockSpeech::new());

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(RgbImage::new(0, 0), "Find the bottles"));

  assert!(outcome.is_degraded());
  assert_eq!(outcome.image().dimensions(), (0, 0));
  assert_eq!(ctx.model.call_count(), 0);
}

#[test]
fn detections_beyond_limit_are_dropped() {
  let entries: Vec<String> = (0..30)
    .map(|i| format!("{{\"box_2d\": [10, {}, 20, {}], \"label\": \"toy {}\"}}", i * 30, i * 30 + 10, i))
    .collect();
  let reply = format!("[{}]", entries.join(","));
  let ctx = context(MockModel::new().reply(&reply), MockSpeech::new());

  let outcome = ctx
    .detection()
    .detect(DetectionRequest::new(nursery_photo(), "Find the toys"));

  assert_eq!(outcome.boxes().len(), 25);
  assert_eq!(outcome.diagnostic(), reply);
}

#[test]
fn question_without_search_adds_two_turns() {
  let ctx = context(MockModel::new().reply("Ages 0-6 months."), MockSpeech::new());

  let transcript = ctx
    .conversation()
    .ask("Is it suitable for newborns", "[bottle]", false, Transcript::new());

  assert_eq!(
    transcript.speakers().collect::<Vec<_>>(),
    vec![Speaker::User, Speaker::Assistant]
  );
  assert_eq!(transcript.turns()[1].text, "Ages 0-6 months.");

  let requests = ctx.model.requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(
    requests[0].prompt_text(),
    "Is it suitable for newborns. Objects detected: [bottle]"
  );
  assert!(!requests[0].google_search);
}

#[test]
fn question_with_search_adds_augmented_turn() {
  let ctx = context(
    MockModel::new()
      .reply("Ages 0-6 months.")
      .reply_with_search("grounded", "<div class=\"chips\">bottle safety</div>"),
    MockSpeech::new(),
  );

  let answer = ctx
    .conversation()
    .query("Is it BPA free", "[bottle]", true)
    .unwrap();
  assert_eq!(answer.baseline, "Ages 0-6 months.");
  assert_eq!(answer.search.as_text(), "<div class=\"chips\">bottle safety</div>");

  let requests = ctx.model.requests();
  assert_eq!(requests.len(), 2);
  assert!(!requests[0].google_search);
  assert!(requests[1].google_search);
}

#[test]
fn search_transcript_has_three_turns() {
  let ctx = context(
    MockModel::new()
      .reply("Ages 0-6 months.")
      .reply_with_search("grounded", "<div>results</div>"),
    MockSpeech::new(),
  );

  let transcript = ctx
    .conversation()
    .ask("Is it BPA free", "[bottle]", true, Transcript::new());

  assert_eq!(
    transcript.speakers().collect::<Vec<_>>(),
    vec![Speaker::User, Speaker::Assistant, Speaker::AssistantAugmented]
  );
  assert_eq!(transcript.last().map(|t| t.text.as_str()), Some("<div>results</div>"));
}

#[test]
fn failed_question_appends_single_system_turn() {
  let ctx = context(MockModel::new().fail("network down"), MockSpeech::new());
  let mut history = Transcript::new();
  history.push(Speaker::User, "Hello");
  history.push(Speaker::Assistant, "Hi there");

  let transcript = ctx
    .conversation()
    .ask("Is it safe", "[bottle]", false, history.clone());

  assert_eq!(transcript.len(), 3);
  assert_eq!(&transcript.turns()[..2], history.turns());
  let last = transcript.last().unwrap();
  assert_eq!(last.speaker, Speaker::System);
  assert_eq!(
    last.text,
    "Error: upstream call failed: mock upstream: network down"
  );
}

#[test]
fn search_without_rendered_content_is_an_error() {
  let ctx = context(
    MockModel::new().reply("baseline").reply("no grounding"),
    MockSpeech::new(),
  );

  let transcript = ctx
    .conversation()
    .ask("Is it BPA free", "[bottle]", true, Transcript::new());

  assert_eq!(transcript.speakers().collect::<Vec<_>>(), vec![Speaker::System]);
}

#[test]
fn ask_task_keeps_question_order() {
  let ctx = context(
    MockModel::new().reply("first").reply("second"),
    MockSpeech::new(),
  );

  let transcript = AskTask::new("[bottle]")
    .run_task(["One?", "Two?"], &ctx)
    .unwrap();

  let texts: Vec<&str> = transcript.turns().iter().map(|t| t.text.as_str()).collect();
  assert_eq!(texts, vec!["One?", "first", "Two?", "second"]);
}

#[test]
fn narration_produces_wav_artifact() {
  let ctx = context(
    MockModel::new().reply("  Hello, I'm MommyBird!  "),
    MockSpeech::new(),
  );

  let narration = ctx.narration().narrate("baby monitors").unwrap();

  assert_eq!(narration.script.text, "Hello, I'm MommyBird!");
  assert_eq!(ctx.speech.texts(), vec!["Hello, I'm MommyBird!".to_string()]);
  assert_eq!(narration.audio.format(), AudioFormat::Wav);

  let reader = hound::WavReader::open(narration.audio.path()).unwrap();
  assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
  assert_eq!(reader.spec().channels, 1);
  assert!(reader.len() > 0);

  let requests = ctx.model.requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(
    requests[0].system_instruction.as_deref(),
    Some(PODCAST_SYSTEM_INSTRUCTION)
  );
  assert_eq!(requests[0].temperature, Some(0.5));
  assert_eq!(requests[0].safety_settings.len(), 4);
  assert!(
    requests[0]
      .safety_settings
      .iter()
      .all(|s| s.threshold == HarmBlockThreshold::BlockLowAndAbove)
  );
  assert!(requests[0].prompt_text().contains("baby monitors"));
}

#[test]
fn mp3_synthesis_is_exported_as_wav() {
  let ctx = context(MockModel::new().reply("Hello, I'm MommyBird!"), MockSpeech::mp3());

  let narration = ctx.narration().narrate("baby monitors").unwrap();

  assert_eq!(narration.audio.format(), AudioFormat::Wav);
  let reader = hound::WavReader::open(narration.audio.path()).unwrap();
  assert_eq!(reader.spec().sample_rate, MP3_SAMPLE_RATE);
  assert_eq!(reader.spec().channels, 1);
  assert!(reader.len() > 0);
}

#[test]
fn blank_topic_never_reaches_model() {
  let ctx = context(MockModel::new().reply("Script"), MockSpeech::new());

  let result = NarrateTask::default()
    .with_topic(Some("   ".to_string()))
    .run_task("", &ctx);

  let error = result.unwrap_err();
  match error.downcast_ref::<NarrationError>() {
    Some(NarrationError::InvalidInput(message)) => {
      assert_eq!(message, "No topic provided for the podcast script.")
    }
    other => panic!("unexpected error: {:?}", other),
  }
  assert_eq!(ctx.model.call_count(), 0);
  assert_eq!(ctx.speech.call_count(), 0);
}

#[test]
fn artifact_is_removed_on_drop() {
  let ctx = context(MockModel::new().reply("Welcome back!"), MockSpeech::new());

  let narration = ctx.narration().narrate("sleep").unwrap();
  let path = narration.audio.path().to_path_buf();
  assert!(path.exists());
  drop(narration);
  assert!(!path.exists());
}

#[test]
fn empty_script_never_reaches_speech() {
  let ctx = context(MockModel::new().reply("   \n "), MockSpeech::new());

  let result = ctx.narration().narrate("sleep");

  match result {
    Err(NarrationError::InvalidInput(message)) => {
      assert_eq!(message, "No script provided for audio conversion.")
    }
    other => panic!("unexpected result: {:?}", other.map(|n| n.script)),
  }
  assert_eq!(ctx.speech.call_count(), 0);
}

#[test]
fn speech_failure_is_reported() {
  let ctx = context(MockModel::new().reply("Welcome back!"), MockSpeech::failing());

  let result = ctx.narration().narrate("sleep");

  assert!(matches!(result, Err(NarrationError::SpeechError(_))));
  assert_eq!(ctx.speech.call_count(), 1);
}

#[test]
fn custom_topic_overrides_detection_context() {
  let ctx = context(MockModel::new().reply("Script"), MockSpeech::new());

  NarrateTask::default()
    .with_topic(Some("Benefits of baby monitors".to_string()))
    .run_task("[bottle]", &ctx)
    .unwrap();

  let prompt = ctx.model.requests()[0].prompt_text();
  assert!(prompt.contains("Benefits of baby monitors"));
  assert!(!prompt.contains("[bottle]"));
}

#[test]
fn detect_task_saves_annotated_image() {
  let dir = tempfile::tempdir().unwrap();
  let target = dir.path().join("labelled.png");
  let ctx = context(MockModel::new().reply(BOTTLE_REPLY), MockSpeech::new());

  let outcome = DetectTask::default()
    .with_output(Some(SaveImageFileOutput::new(&target)))
    .run_task(DetectionRequest::new(nursery_photo(), "Find the bottles"), &ctx)
    .unwrap();

  let saved = image::open(&target).unwrap().to_rgb8();
  assert_eq!(&saved, outcome.image());
}

#[test]
fn session_uses_detection_output_as_context() {
  let dir = tempfile::tempdir().unwrap();
  let image_path = dir.path().join("labelled.png");
  let audio_path = dir.path().join("podcast.wav");
  let ctx = context(
    MockModel::new()
      .reply(BOTTLE_REPLY)
      .reply("Yes, it is BPA free.")
      .reply("Hello, I'm MommyBird!"),
    MockSpeech::new(),
  );

  let report = SessionTask::default()
    .with_questions(vec!["Is it BPA free".to_string()])
    .with_narration(true, Some("   ".to_string()))
    .with_image_output(Some(SaveImageFileOutput::new(&image_path)))
    .with_audio_output(Some(SaveAudioFileOutput::new(&audio_path)))
    .run_task(DetectionRequest::new(nursery_photo(), "Find the bottles"), &ctx)
    .unwrap();

  assert!(!report.outcome.is_degraded());
  assert_eq!(report.transcript.len(), 2);
  let narration = report.narration.as_ref().unwrap();
  assert_eq!(narration.script.text, "Hello, I'm MommyBird!");

  let requests = ctx.model.requests();
  assert_eq!(requests.len(), 3);
  assert!(requests[1].prompt_text().ends_with(BOTTLE_REPLY));
  // 空白话题回退到检测输出
  assert!(requests[2].prompt_text().contains(BOTTLE_REPLY));

  assert!(image_path.exists());
  let reader = hound::WavReader::open(&audio_path).unwrap();
  assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
}
