//! Encoded-polyline decoding (signed varint deltas, 1e5 precision).
//!
//! Routing providers return driving geometry in this format. Malformed
//! input decodes to an empty sequence: a broken provider response must
//! degrade to "no route", never to a panic or a half-route.

use geo::Point;

const PRECISION: f64 = 1e5;

/// Decode an encoded polyline into lon/lat points.
///
/// Returns an empty vec for malformed input (truncated varint, byte
/// outside the encoding alphabet, runaway continuation).
pub fn decode(encoded: &str) -> Vec<Point> {
    try_decode(encoded).unwrap_or_default()
}

fn try_decode(encoded: &str) -> Option<Vec<Point>> {
    let mut bytes = encoded.bytes().peekable();
    let mut points = Vec::new();
    let (mut lat, mut lng) = (0i64, 0i64);

    while bytes.peek().is_some() {
        lat += decode_value(&mut bytes)?;
        lng += decode_value(&mut bytes)?;
        points.push(Point::new(lng as f64 / PRECISION, lat as f64 / PRECISION));
    }

    Some(points)
}

/// One zigzag-encoded delta: 5-bit chunks, low to high, bit 6 as continuation.
fn decode_value(bytes: &mut std::iter::Peekable<std::str::Bytes<'_>>) -> Option<i64> {
    let mut accumulator = 0i64;
    let mut shift = 0u32;

    loop {
        let byte = bytes.next()?;
        if !(63..=126).contains(&byte) {
            return None;
        }
        let chunk = (byte - 63) as i64;
        accumulator |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk & 0x20 == 0 {
            break;
        }
        if shift > 35 {
            return None;
        }
    }

    Some(if accumulator & 1 != 0 {
        !(accumulator >> 1)
    } else {
        accumulator >> 1
    })
}
