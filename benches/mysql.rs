/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::time::Instant;

use criterion::*;

use mysql_dissector::{
    flow_generator::protocol_logs::decode_length_encoded_int, DecoderTables, FlowKey,
    MysqlConfig, MysqlLog, NullSink, PacketDirection, ParseParam,
};

fn packet(sequence: u8, body: &[u8]) -> Vec<u8> {
    let mut p = (body.len() as u32).to_le_bytes()[..3].to_vec();
    p.push(sequence);
    p.extend_from_slice(body);
    p
}

fn handshake() -> Vec<(PacketDirection, Vec<u8>)> {
    let mut greeting = vec![0x0a];
    greeting.extend_from_slice(b"8.0.32\0");
    greeting.extend_from_slice(&1u32.to_le_bytes());
    greeting.extend_from_slice(b"12345678\0");
    greeting.extend_from_slice(&0x8200u16.to_le_bytes());
    greeting.push(0xff);
    greeting.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 21]);
    greeting.extend_from_slice(&[0; 10]);
    greeting.extend_from_slice(b"abcdefghijkl\0");

    let mut login = 0x8200u16.to_le_bytes().to_vec();
    login.extend_from_slice(&[0; 2 + 4 + 1 + 23]);
    login.extend_from_slice(b"root\0\0");

    vec![
        (PacketDirection::ServerToClient, packet(0, &greeting)),
        (PacketDirection::ClientToServer, packet(1, &login)),
        (
            PacketDirection::ServerToClient,
            packet(2, &[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]),
        ),
    ]
}

fn bench_mysql(c: &mut Criterion) {
    c.bench_function("mysql_length_encoded_int", |b| {
        let buf = [0xfe, 1, 2, 3, 4, 5, 6, 7, 8];
        b.iter(|| decode_length_encoded_int(black_box(&buf), 0))
    });
    c.bench_function("mysql_query_round_trip", |b| {
        b.iter_custom(|iters| {
            let key = FlowKey::new(
                "10.1.1.1:51000".parse().unwrap(),
                "10.1.1.2:3306".parse().unwrap(),
            );
            let mut log = MysqlLog::new(MysqlConfig::default(), DecoderTables::default());
            let mut sink = NullSink;
            let mut frame = 0;
            for (direction, payload) in handshake() {
                frame += 1;
                let param = ParseParam::new(frame, direction);
                let _ = log.parse_payload(key, &param, &payload, &mut sink);
            }
            let query = packet(0, b"\x03select * from t where id = 1");
            let ok = packet(1, &[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00]);

            let start = Instant::now();
            for _ in 0..iters {
                frame += 1;
                let param = ParseParam::new(frame, PacketDirection::ClientToServer);
                let _ = log.parse_payload(key, &param, &query, &mut sink);
                frame += 1;
                let param = ParseParam::new(frame, PacketDirection::ServerToClient);
                let _ = log.parse_payload(key, &param, &ok, &mut sink);
            }
            start.elapsed()
        })
    });
}

criterion_group!(benches, bench_mysql);
criterion_main!(benches);
