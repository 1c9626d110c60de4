//! Session multiplexer end to end: simulated typewriter, key matrix and client

use embassy_futures::block_on;
use typebridge_core::keyboard::{MatrixScanner, ScannerConfig};
use typebridge_core::link::{DeviceLink, HandshakeStage, LinkConfig, LinkError};
use typebridge_core::session::{
    Activity, CloseReason, Multiplexer, SessionConfig, SessionState,
};
use typebridge_core::traits::StatusIndicator;
use typebridge_hal::mock::{
    AddressLine, KeyMatrix, MockDelay, MockStream, RecordingPin, ScheduledInput, SenseLine,
    SimulatedTypewriter, TypewriterSerial, VirtualClock,
};
use typebridge_protocol::{Command, InboundMode, KeyboardSnapshot};

type Link = DeviceLink<TypewriterSerial, RecordingPin, ScheduledInput, MockDelay>;
type Scanner = MatrixScanner<[AddressLine; 5], SenseLine, MockDelay>;
type Mux = Multiplexer<Link, Scanner, VirtualClock, MockDelay>;

#[derive(Default)]
struct CountingIndicator {
    pulses: u32,
}

impl StatusIndicator for CountingIndicator {
    async fn pulse(&mut self) {
        self.pulses += 1;
    }
}

struct Bench {
    clock: VirtualClock,
    typewriter: SimulatedTypewriter,
    matrix: KeyMatrix,
    client: MockStream,
    mux: Mux,
}

fn bench_with(config: SessionConfig) -> Bench {
    let clock = VirtualClock::new();
    let typewriter = SimulatedTypewriter::new(&clock);
    let matrix = KeyMatrix::new();
    let link = DeviceLink::new(
        typewriter.serial(),
        typewriter.reset_line(),
        typewriter.handshake_line(),
        clock.delay(),
        LinkConfig::default(),
    )
    .unwrap();
    let scanner = MatrixScanner::new(
        matrix.address_pins(),
        matrix.sense_line(),
        clock.delay(),
        ScannerConfig::default(),
    );
    let mux = Multiplexer::new(link, scanner, clock.clone(), clock.delay(), config);
    let client = MockStream::new(&clock);
    Bench {
        clock,
        typewriter,
        matrix,
        client,
        mux,
    }
}

fn bench() -> Bench {
    bench_with(SessionConfig::default())
}

fn implicit() -> SessionConfig {
    SessionConfig {
        mode: InboundMode::Implicit,
        scan_interval_ms: 50,
        ..SessionConfig::default()
    }
}

#[test]
fn attach_signals_indicator_and_activates() {
    let mut bench = bench();
    assert_eq!(bench.mux.state(), SessionState::Idle);
    bench.mux.listen();
    assert_eq!(bench.mux.state(), SessionState::AwaitingClient);

    let mut indicator = CountingIndicator::default();
    let session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(indicator.pulses, 1);
}

#[test]
fn silent_command_yields_empty_response_frame() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0x10, 0x20]);
    let sweep = block_on(session.poll_once()).unwrap();

    assert_eq!(
        &sweep[..],
        &[Activity::Answered {
            command: Command::new(0x10, 0x20),
            length: 0
        }]
    );
    assert_eq!(bench.client.written(), vec![0x80]);
    assert_eq!(bench.typewriter.commands(), vec![(0x10, 0x20)]);
}

#[test]
fn single_byte_answer_is_framed() {
    let mut bench = bench();
    bench.typewriter.respond(&[0x05], 0);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0xA0, 0x00]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(bench.client.written(), vec![0x81, 0x05]);
}

#[test]
fn sentinel_answer_is_framed_with_length() {
    let mut bench = bench();
    bench.typewriter.respond(&[0xA4, 0x10, 0x20], 1000);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0xA4, 0x00]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(bench.client.written(), vec![0x83, 0xA4, 0x10, 0x20]);
}

#[test]
fn scan_request_sends_snapshot_msb_first() {
    let mut bench = bench();
    bench.matrix.press(3);
    bench.matrix.press(17);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x02]);
    let sweep = block_on(session.poll_once()).unwrap();

    assert_eq!(
        &sweep[..],
        &[Activity::ScanRequested(KeyboardSnapshot::from_lines(&[3, 17]))]
    );
    assert_eq!(bench.client.written(), vec![0x02, 0x00, 0x02, 0x00, 0x08]);
}

#[test]
fn handshake_timeout_keeps_session_active() {
    let mut bench = bench();
    bench.typewriter.stop_acknowledging_after(0);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0x10, 0x20]);
    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(
        &sweep[..],
        &[Activity::CommandFailed {
            command: Command::new(0x10, 0x20),
            error: LinkError::HandshakeTimeout {
                stage: HandshakeStage::FirstFall
            },
        }]
    );
    assert_eq!(bench.client.take_written(), vec![0x80]);
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.stats().failed_commands, 1);

    // Later commands still go through
    bench.typewriter.acknowledge_all();
    bench.client.push(&[0x02]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(bench.client.take_written(), vec![0x02, 0, 0, 0, 0]);
}

#[test]
fn one_frame_per_source_in_a_sweep() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.typewriter.emit(0x42);
    bench.typewriter.emit(0x43);
    bench.client.push(&[0x02, 0x02]);

    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(
        &sweep[..],
        &[
            Activity::Relayed(0x42),
            Activity::ScanRequested(KeyboardSnapshot(0))
        ]
    );
    assert_eq!(
        bench.client.take_written(),
        vec![0x01, 0x42, 0x02, 0, 0, 0, 0]
    );

    // Device byte first, then the client again
    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(
        &sweep[..],
        &[
            Activity::Relayed(0x43),
            Activity::ScanRequested(KeyboardSnapshot(0))
        ]
    );
}

#[test]
fn malformed_opcode_is_dropped_and_decoding_resumes() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x7E, 0x02]);
    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(&sweep[..], &[Activity::Malformed(0x7E)]);
    assert!(bench.client.written().is_empty());

    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(&sweep[..], &[Activity::ScanRequested(KeyboardSnapshot(0))]);
    assert_eq!(session.stats().malformed, 1);
}

#[test]
fn split_instruction_is_reassembled() {
    let mut bench = bench();
    bench.typewriter.respond(&[0x05], 0);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0xA0]);
    let sweep = block_on(session.poll_once()).unwrap();
    assert!(sweep.is_empty());
    assert!(bench.typewriter.received().is_empty());

    bench.client.push(&[0x00]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(bench.typewriter.commands(), vec![(0xA0, 0x00)]);
    assert_eq!(bench.client.written(), vec![0x81, 0x05]);
}

#[test]
fn late_device_byte_is_relayed_separately() {
    let mut bench = bench();
    bench.typewriter.respond_timed(&[(0, 0xA4), (5000, 0x55)]);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0xA4, 0x00]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(bench.client.take_written(), vec![0x81, 0xA4]);

    let mut relayed = None;
    for _ in 0..100 {
        let sweep = block_on(session.poll_once()).unwrap();
        if let Some(Activity::Relayed(byte)) = sweep.first() {
            relayed = Some(*byte);
            break;
        }
    }
    assert_eq!(relayed, Some(0x55));
    assert_eq!(bench.client.written(), vec![0x01, 0x55]);
}

#[test]
fn idle_sweep_yields() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    let before = bench.clock.now_us();
    let sweep = block_on(session.poll_once()).unwrap();
    assert!(sweep.is_empty());
    assert_eq!(bench.clock.now_us() - before, 100);
}

#[test]
fn implicit_mode_pairs_bytes_into_commands() {
    let mut bench = bench_with(implicit());
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    // 0x01 and 0x02 carry no meaning of their own here
    bench.client.push(&[0x01, 0x02]);
    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(
        &sweep[..],
        &[Activity::Answered {
            command: Command::new(0x01, 0x02),
            length: 0
        }]
    );
    assert_eq!(bench.client.written(), vec![0x80]);
}

#[test]
fn implicit_mode_pushes_scans_on_interval() {
    let mut bench = bench_with(implicit());
    bench.matrix.press(0);
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    let sweep = block_on(session.poll_once()).unwrap();
    assert!(sweep.is_empty());

    bench.clock.advance_ms(50);
    let sweep = block_on(session.poll_once()).unwrap();
    assert_eq!(
        &sweep[..],
        &[Activity::ScanPushed(KeyboardSnapshot::from_lines(&[0]))]
    );
    assert_eq!(bench.client.take_written(), vec![0x02, 0, 0, 0, 0x01]);

    // Not again until the next interval
    let sweep = block_on(session.poll_once()).unwrap();
    assert!(sweep.is_empty());
}

#[test]
fn explicit_mode_never_pushes_scans() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.clock.advance_ms(1000);
    let sweep = block_on(session.poll_once()).unwrap();
    assert!(sweep.is_empty());
    assert!(bench.client.written().is_empty());
}

#[test]
fn disconnect_closes_then_reset_returns_to_idle() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.close();
    assert_eq!(
        block_on(session.poll_once()),
        Err(CloseReason::ClientDisconnected)
    );
    assert_eq!(session.state(), SessionState::Closed);
    // Stays closed
    assert_eq!(
        block_on(session.poll_once()),
        Err(CloseReason::ClientDisconnected)
    );
    drop(session);

    assert_eq!(bench.mux.state(), SessionState::Closed);
    bench.mux.reset();
    assert_eq!(bench.mux.state(), SessionState::Idle);
}

#[test]
fn queued_instructions_finish_before_disconnect() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.push(&[0x01, 0x10, 0x20, 0x02]);
    bench.client.close();

    let mut seen = Vec::new();
    let (reason, stats) = block_on(session.run(|activity| seen.push(*activity)));
    assert_eq!(reason, CloseReason::ClientDisconnected);
    assert_eq!(stats.commands, 1);
    assert_eq!(stats.scans_requested, 1);
    assert_eq!(seen.len(), 2);
    assert_eq!(
        bench.client.written(),
        vec![0x80, 0x02, 0, 0, 0, 0]
    );
}

#[test]
fn write_failure_closes_session() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();
    let mut session = block_on(bench.mux.attach(bench.client.clone(), &mut indicator));

    bench.client.fail_writes();
    bench.typewriter.emit(0x42);
    assert_eq!(
        block_on(session.poll_once()),
        Err(CloseReason::WriteFailed(embedded_io_async::ErrorKind::BrokenPipe))
    );
}

#[test]
fn sessions_can_follow_each_other() {
    let mut bench = bench();
    let mut indicator = CountingIndicator::default();

    let first = bench.client.clone();
    let mut session = block_on(bench.mux.attach(first.clone(), &mut indicator));
    first.close();
    assert!(block_on(session.poll_once()).is_err());
    drop(session);
    bench.mux.reset();

    let second = MockStream::new(&bench.clock);
    bench.mux.listen();
    let mut session = block_on(bench.mux.attach(second.clone(), &mut indicator));
    second.push(&[0x02]);
    block_on(session.poll_once()).unwrap();
    assert_eq!(second.written(), vec![0x02, 0, 0, 0, 0]);
    assert_eq!(indicator.pulses, 2);
}
