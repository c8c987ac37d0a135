//! End-to-end take over the simulated sensor and a MAVLink byte sink

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ccu_spectrum::capture::sim::SimulatedSensor;
use ccu_spectrum::capture::{CaptureController, FrameGeometry, Window};
use ccu_spectrum::gateway::MavlinkGateway;
use ccu_spectrum::mavlink::decoder::{decode_message, decode_stream};
use ccu_spectrum::mavlink::encoder::MessageEncoder;
use ccu_spectrum::mavlink::protocol::{DataStreamType, Message, SPECTRUM_ROWS_PER_PACKET};
use ccu_spectrum::pipeline::{SpectrumCamera, TakeRequest};
use ccu_spectrum::serial::SerialPortIO;
use ccu_spectrum::spectrum::packetizer::Pacing;

/// Serial port that appends everything to a shared byte buffer
#[derive(Clone, Default)]
struct ByteSink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

#[async_trait]
impl SerialPortIO for ByteSink {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const NO_PACING: Pacing = Pacing {
    photo_packet_delay: Duration::ZERO,
    spectrum_packet_delay: Duration::ZERO,
};

fn camera(sink: &ByteSink) -> (SpectrumCamera<MavlinkGateway>, impl Fn() -> u32) {
    let geometry = FrameGeometry::default();
    let sensor = SimulatedSensor::new(geometry, Duration::from_millis(5));
    let delivered = sensor.delivery_counter();
    let capture = CaptureController::new(Box::new(sensor), geometry);
    let gateway = MavlinkGateway::new(MessageEncoder::new(0, 100), Box::new(sink.clone()));

    (SpectrumCamera::new(capture, gateway, 1, NO_PACING), delivered)
}

fn received(sink: &ByteSink) -> Vec<Message> {
    let bytes = sink.bytes.lock().unwrap().clone();
    decode_stream(&bytes)
        .unwrap()
        .iter()
        .map(|frame| decode_message(frame).unwrap())
        .collect()
}

#[tokio::test]
async fn test_photo_and_spectrum_describe_the_same_frame() {
    let sink = ByteSink::default();
    let (mut camera, _) = camera(&sink);
    camera.init().unwrap();

    let window = Window {
        y_start: 10,
        y_end: 130,
        x_start: 150,
        x_end: 200,
    };
    let report = camera
        .take(&TakeRequest {
            send_photo: true,
            window,
        })
        .await
        .unwrap();

    assert_eq!(report.photo_packets, Some(357));
    assert_eq!(report.spectrum_packets, 1);

    let messages = received(&sink);
    assert_eq!(messages.len(), 2 + 357 + 2);

    let size = match &messages[0] {
        Message::Handshake(h) => {
            assert_eq!(h.stream_type, DataStreamType::ImgRaw8U);
            assert_eq!((h.width, h.height), (376, 240));
            assert_eq!(h.packets, 357);
            h.size as usize
        }
        other => panic!("Expected handshake, got {:?}", other),
    };
    assert_eq!(size, 90_240);
    assert!(matches!(messages[1], Message::PictureHeader(_)));

    // Reassemble the image in sequence order
    let mut image = Vec::with_capacity(size);
    for (index, message) in messages[2..359].iter().enumerate() {
        match message {
            Message::EncapsulatedData(d) => {
                assert_eq!(d.seqnr as usize, index);
                image.extend_from_slice(&d.data);
            }
            other => panic!("Expected image data, got {:?}", other),
        }
    }
    image.truncate(size);

    let expected: Vec<u16> = (window.y_start..window.y_end)
        .map(|y| {
            let row = &image[y as usize * 376..(y as usize + 1) * 376];
            row[window.x_start as usize..window.x_end as usize]
                .iter()
                .map(|&b| b as u16)
                .sum()
        })
        .collect();

    match &messages[359] {
        Message::SpectrumHeader(h) => {
            assert_eq!(h.size, 240);
            assert_eq!(h.packets, 1);
            assert_eq!(h.y_crop_offset, 10);
            assert_eq!(h.time_boot_ms, report.time_boot_ms);
        }
        other => panic!("Expected spectrum header, got {:?}", other),
    }
    match &messages[360] {
        Message::SpectrumData(d) => {
            assert_eq!(d.seqnr, 0);
            assert_eq!(d.data.len(), SPECTRUM_ROWS_PER_PACKET);
            assert_eq!(d.data.to_vec(), expected);
        }
        other => panic!("Expected spectrum data, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spectrum_profile_shows_emission_line() {
    let sink = ByteSink::default();
    let (mut camera, _) = camera(&sink);
    camera.init().unwrap();

    // Columns 180..196 contain the line at width / 2 = 188
    let request = TakeRequest {
        send_photo: false,
        window: Window {
            y_start: 0,
            y_end: 240,
            x_start: 180,
            x_end: 196,
        },
    };
    camera.take(&request).await.unwrap();

    let messages = received(&sink);
    assert_eq!(messages.len(), 3);

    let profile: Vec<u16> = messages[1..]
        .iter()
        .flat_map(|m| match m {
            Message::SpectrumData(d) => d.data.to_vec(),
            other => panic!("Expected spectrum data, got {:?}", other),
        })
        .collect();

    // Background alone stays under 16 * 15
    assert!(profile.iter().all(|&sum| sum > 16 * 15));
}

#[tokio::test]
async fn test_each_take_waits_for_new_frames() {
    let sink = ByteSink::default();
    let (mut camera, delivered) = camera(&sink);
    camera.init().unwrap();

    let request = TakeRequest {
        send_photo: false,
        window: Window {
            y_start: 0,
            y_end: 8,
            x_start: 0,
            x_end: 8,
        },
    };

    camera.take(&request).await.unwrap();
    let after_first = delivered();
    camera.take(&request).await.unwrap();
    let after_second = delivered();

    // The first take discards the frame armed by init and waits for another;
    // later takes discard the frame the previous take read
    assert_eq!(after_first, 2);
    assert_eq!(after_second, 3);
    assert_eq!(received(&sink).len(), 4);
}
