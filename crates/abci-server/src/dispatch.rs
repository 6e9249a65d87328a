//! Request dispatch onto an [`Application`].

use abci_types::{Application, Request, Response, ResponseEcho, ResponseFlush};

/// Routes one request to the matching application method.
///
/// Housekeeping requests are answered here. Requests for methods the
/// application surface does not cover are answered with an exception so a
/// driver/application version mismatch is never mistaken for success.
pub fn dispatch(app: &dyn Application, request: Request) -> Response {
    match request {
        Request::Echo(request) => ResponseEcho {
            message: request.message,
        }
        .into(),
        Request::Flush(_) => ResponseFlush {}.into(),
        Request::Info(request) => app.info(request).into(),
        Request::Query(request) => app.query(request).into(),
        Request::CheckTx(request) => app.check_tx(request).into(),
        Request::InitChain(request) => app.init_chain(request).into(),
        Request::PrepareProposal(request) => app.prepare_proposal(request).into(),
        Request::BeginBlock(request) => app.begin_block(request).into(),
        Request::DeliverTx(request) => app.deliver_tx(request).into(),
        Request::EndBlock(request) => app.end_block(request).into(),
        Request::Commit(_) => app.commit().into(),
        Request::ExtendVote(request) => app.extend_vote(request).into(),
        Request::VerifyVoteExtension(request) => app.verify_vote_extension(request).into(),
        Request::ListSnapshots(request) => app.list_snapshots(request).into(),
        Request::OfferSnapshot(request) => app.offer_snapshot(request).into(),
        Request::LoadSnapshotChunk(request) => app.load_snapshot_chunk(request).into(),
        Request::ApplySnapshotChunk(request) => app.apply_snapshot_chunk(request).into(),
        Request::ProcessProposal(_) => Response::exception("process_proposal is not implemented"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abci_types::{BaseApplication, Method, RequestInfo, RequestProcessProposal, ResponseInfo};

    #[test]
    fn test_housekeeping_answered_locally() {
        let app = BaseApplication::new();

        assert_eq!(
            dispatch(&app, Request::echo("ping")),
            Response::Echo(ResponseEcho {
                message: "ping".into()
            })
        );
        assert_eq!(dispatch(&app, Request::flush()).method(), Some(Method::Flush));
    }

    #[test]
    fn test_every_request_gets_matching_response() {
        let app = BaseApplication::new();
        let requests = [
            Request::Info(RequestInfo::default()),
            Request::commit(),
            Request::CheckTx(Default::default()),
            Request::ApplySnapshotChunk(Default::default()),
        ];

        for request in requests {
            let method = request.method();
            let response = dispatch(&app, request);
            assert_eq!(response.method(), Some(method));
        }
    }

    #[test]
    fn test_process_proposal_fails_explicitly() {
        let app = BaseApplication::new();
        let response = dispatch(&app, Request::ProcessProposal(RequestProcessProposal::default()));

        assert!(matches!(response, Response::Exception(_)));
    }

    #[test]
    fn test_dispatch_reaches_application() {
        struct Named;
        impl Application for Named {
            fn info(&self, _request: RequestInfo) -> ResponseInfo {
                ResponseInfo {
                    data: "named".into(),
                    ..Default::default()
                }
            }
        }

        let response = dispatch(&Named, Request::Info(RequestInfo::default()));
        match response {
            Response::Info(info) => assert_eq!(info.data, "named"),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
