use bytes::BytesMut;
use proptest::prelude::*;

use ucan_protocol::{CanMsg, EXT_ID_MAX, FrameFormat, STD_ID_MAX, decode_msg, encode_msg};

fn arb_msg() -> impl Strategy<Value = CanMsg> {
    (
        any::<bool>(),
        any::<u32>(),
        proptest::collection::vec(any::<u8>(), 0..=8),
        any::<bool>(),
        any::<u32>(),
    )
        .prop_map(|(extended, raw_id, data, remote, timestamp_ms)| {
            let format = if extended {
                FrameFormat::Extended
            } else {
                FrameFormat::Standard
            };
            let id = raw_id % (if extended { EXT_ID_MAX } else { STD_ID_MAX } + 1);
            let mut msg = if remote {
                CanMsg::new_remote(id, format, data.len() as u8).unwrap()
            } else {
                CanMsg::new(id, format, &data).unwrap()
            };
            msg.timestamp_ms = timestamp_ms;
            msg
        })
}

proptest! {
    #[test]
    fn encode_decode_preserves_message(msg in arb_msg()) {
        let mut buf = BytesMut::new();
        encode_msg(&msg, &mut buf);
        let decoded = decode_msg(&buf).unwrap();
        prop_assert_eq!(decoded, msg);
    }
}
