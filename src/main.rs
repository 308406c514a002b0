use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur::api::ApiServerBuilder;
use murmur::client::{ApiClient, ClientLoop, ConsoleSpeaker, RemoteSpeaker, WakePhrase};
use murmur::voice::{
    AudioPlayback, InputDevice, MicrophoneRecognizer, SAMPLE_RATE, SpeechRecognizer,
    SpeechSynthesizer, SpeechToText, Speaker, StdinRecognizer, TextToSpeech, calculate_energy,
};
use murmur::{
    CompletionModel, Config, InteractionRepo, InteractionStore, LanguageModel, TurnHandler, db,
};

/// Murmur - voice-driven conversational assistant
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Port for the turn server
    #[arg(long, env = "MURMUR_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP turn server (default)
    Serve,
    /// Run the voice client loop against a turn server
    Listen {
        /// Read utterances from stdin instead of the microphone
        #[arg(long)]
        keyboard: bool,
        /// Print replies instead of speaking them
        #[arg(long)]
        mute: bool,
        /// User to converse as
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Show a user's stored interactions
    History {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,murmur=info",
        1 => "info,murmur=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Listen {
            keyboard,
            mute,
            user,
        } => {
            if let Some(user) = user {
                config.client.user_id = user;
            }
            listen(&config, keyboard, mute).await
        }
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker(),
        Command::TestTts { text } => test_tts(&config, &text).await,
        Command::History { user } => {
            let user = user.unwrap_or_else(|| config.client.user_id.clone());
            history(&config, &user).await
        }
    }
}

/// Run the turn server until it fails
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting murmur turn server"
    );

    let store = open_store(&config);
    let model = load_model(&config).await;

    let mut builder = ApiServerBuilder::new(TurnHandler::new(model, store, config.turn))
        .host(config.server.host.clone())
        .port(config.server.port);

    match TextToSpeech::from_config(&config.api_keys, &config.voice) {
        Ok(tts) => {
            tracing::info!(provider = ?tts.provider(), "text-to-speech ready");
            builder = builder.synthesizer(Arc::new(tts) as Arc<dyn SpeechSynthesizer>);
        }
        Err(e) => tracing::warn!(error = %e, "text-to-speech disabled"),
    }

    builder.build().run().await?;
    Ok(())
}

/// Open the interaction store; failures leave the server without history
fn open_store(config: &Config) -> Option<Arc<dyn InteractionStore>> {
    if !config.store.enabled {
        tracing::info!("interaction store disabled");
        return None;
    }

    match db::init(&config.store.path) {
        Ok(pool) => Some(Arc::new(InteractionRepo::new(pool))),
        Err(e) => {
            tracing::error!(
                path = %config.store.path.display(),
                error = %e,
                "failed to open interaction store"
            );
            None
        }
    }
}

/// Connect to the inference server; failures leave turns answering `ModelUnavailable`
async fn load_model(config: &Config) -> Option<Arc<dyn LanguageModel>> {
    let model_config = config.model.clone();

    // The blocking HTTP client must be built off the async runtime
    let loaded = tokio::task::spawn_blocking(move || CompletionModel::load(&model_config)).await;

    match loaded {
        Ok(Ok(model)) => Some(Arc::new(model)),
        Ok(Err(e)) => {
            tracing::error!(url = %config.model.url, error = %e, "failed to load language model");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "language model loader panicked");
            None
        }
    }
}

/// Run the voice client loop
#[allow(clippy::future_not_send)]
async fn listen(config: &Config, keyboard: bool, mute: bool) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.client.server_url, config.client.user_id.clone())?;
    let wake = config.client.wake_word.as_deref().map(WakePhrase::new);

    tracing::info!(
        server = %config.client.server_url,
        user_id = %api.user_id(),
        "starting voice client"
    );

    if keyboard {
        let recognizer = StdinRecognizer::new();
        if mute {
            converse(recognizer, ConsoleSpeaker, api, wake).await;
        } else {
            let speaker = RemoteSpeaker::new(api.clone(), AudioPlayback::new()?);
            converse(recognizer, speaker, api, wake).await;
        }
    } else {
        let stt = SpeechToText::from_config(&config.api_keys, &config.voice)?;
        let timeout = Duration::from_secs(config.voice.listen_timeout_secs);
        let recognizer = MicrophoneRecognizer::new(stt, timeout)?;
        if mute {
            converse(recognizer, ConsoleSpeaker, api, wake).await;
        } else {
            let speaker = RemoteSpeaker::new(api.clone(), AudioPlayback::new()?);
            converse(recognizer, speaker, api, wake).await;
        }
    }

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn converse<R, S>(recognizer: R, speaker: S, api: ApiClient, wake: Option<WakePhrase>)
where
    R: SpeechRecognizer,
    S: Speaker,
{
    match &wake {
        Some(w) => tracing::info!("murmur ready - say \"{}\"", w.phrase()),
        None => tracing::info!("murmur ready - start talking (say \"exit\" to stop)"),
    }

    ClientLoop::new(recognizer, speaker, api)
        .with_wake_phrase(wake)
        .run()
        .await;
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let recording = InputDevice::open_default()?.record()?;
    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recording.drain();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(recording);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz at the 24kHz playback rate
    let sample_rate = 24000_u16;
    let frequency = 440.0_f32;
    let num_samples = usize::from(sample_rate) * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / f32::from(sample_rate);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.play(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_config(&config.api_keys, &config.voice)?;
    println!("Provider: {:?}", tts.provider());

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    tokio::task::block_in_place(|| playback.play_mp3(&mp3_data))?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Print a user's stored interactions from the turn server
async fn history(config: &Config, user_id: &str) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.client.server_url, user_id)?;
    let interactions = api.interactions(user_id).await?;

    if interactions.is_empty() {
        println!("No interactions stored for {user_id}");
        return Ok(());
    }

    for interaction in &interactions {
        println!("[{}]", interaction.timestamp);
        println!("{}\n", murmur::conversation::format_interaction(interaction));
    }

    Ok(())
}
