//! URScript command formatting and realtime-packet decoding for UR arms.
//!
//! Commands are plain newline-terminated URScript statements written to the
//! controller's realtime port.  Replies on that port are fixed-size binary
//! state packets; only the fields the rig reads are decoded here.

use pickrig_types::Pose6;

/// Size of one realtime state packet.
pub const REALTIME_PACKET_LEN: usize = 1108;

/// Byte range of the actual joint positions (6 × big-endian f64).
const JOINT_POSITIONS: std::ops::Range<usize> = 252..300;

/// Byte range of the actual TCP pose (6 × big-endian f64).
const TCP_POSE: std::ops::Range<usize> = 588..636;

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `p[x,y,z,rx,ry,rz]`
pub fn pose_literal(pose: &Pose6) -> String {
    format!("p[{}]", join(&pose.to_array()))
}

/// A pose expression offset from the current TCP pose.
pub fn relative_pose(pose: &Pose6) -> String {
    format!("pose_add(get_actual_tcp_pose(), {})", pose_literal(pose))
}

/// Linear move to `target` (any pose expression).
///
/// `t` is the move time (0 = derive from `a`/`v`) and `r` the blend radius.
pub fn movel(target: &str, a: f64, v: f64, t: f64, r: f64) -> String {
    format!("movel({target},{a},{v},{t},{r})\n")
}

/// Cartesian TCP velocity held for `t` seconds (0 = until superseded).
pub fn speedl(velocity: &[f64; 6], a: f64, t: f64) -> String {
    format!("speedl([{}],{a},{t})\n", join(velocity))
}

fn read_six(packet: &[u8], range: std::ops::Range<usize>) -> Option<[f64; 6]> {
    let bytes = packet.get(range)?;
    let mut out = [0.0; 6];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(8)) {
        *slot = f64::from_be_bytes(chunk.try_into().ok()?);
    }
    Some(out)
}

/// Decode the actual TCP pose from a realtime packet.  `None` when the
/// packet is too short.
pub fn parse_tcp_pose(packet: &[u8]) -> Option<Pose6> {
    read_six(packet, TCP_POSE).map(Pose6::from)
}

/// Decode the actual joint positions (rad) from a realtime packet.
pub fn parse_joint_positions(packet: &[u8]) -> Option<[f64; 6]> {
    read_six(packet, JOINT_POSITIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_move_script() {
        let pose = Pose6::new(0.1, -0.005, -0.2, -0.5, 0.0, 0.25);
        let script = movel(&relative_pose(&pose), 5.0, 3.0, 0.0, 0.0);
        assert_eq!(
            script,
            "movel(pose_add(get_actual_tcp_pose(), p[0.1,-0.005,-0.2,-0.5,0,0.25]),5,3,0,0)\n"
        );
    }

    #[test]
    fn absolute_move_script() {
        let pose = Pose6::new(0.116, -0.3, 0.08, 0.0, 0.0, 0.0);
        assert_eq!(
            movel(&pose_literal(&pose), 1.2, 0.5, 0.0, 0.0),
            "movel(p[0.116,-0.3,0.08,0,0,0],1.2,0.5,0,0)\n"
        );
    }

    #[test]
    fn speedl_script() {
        assert_eq!(
            speedl(&[-0.02, 0.0, 0.5, 0.0, 0.0, 0.0], 5.0, 0.5),
            "speedl([-0.02,0,0.5,0,0,0],5,0.5)\n"
        );
    }

    #[test]
    fn decode_realtime_packet_fields() {
        let mut packet = vec![0u8; REALTIME_PACKET_LEN];
        let pose: [f64; 6] = [0.116, -0.3, 0.08, 2.23, 2.23, 0.0];
        for (i, v) in pose.iter().enumerate() {
            let at = 588 + i * 8;
            packet[at..at + 8].copy_from_slice(&v.to_be_bytes());
        }
        let joints: [f64; 6] = [0.0, -1.57, 1.57, -1.57, -1.57, 0.0];
        for (i, v) in joints.iter().enumerate() {
            let at = 252 + i * 8;
            packet[at..at + 8].copy_from_slice(&v.to_be_bytes());
        }

        assert_eq!(parse_tcp_pose(&packet), Some(Pose6::from(pose)));
        assert_eq!(parse_joint_positions(&packet), Some(joints));
    }

    #[test]
    fn short_packet_decodes_to_none() {
        assert_eq!(parse_tcp_pose(&[0u8; 600]), None);
        assert!(parse_joint_positions(&[0u8; 299]).is_none());
    }
}
